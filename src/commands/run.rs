//! Run command implementation.
//!
//! Runs collection cycles on the configured interval until interrupted.

use std::time::Duration;
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use herakles_apps_aggregator::{Config, Engine, Metric};

use super::build_provider;

/// Runs cycles every `update_every` seconds. A classification failure stops
/// the loop with an error; a failed snapshot only skips that cycle.
pub async fn command_run(
    config: &Config,
    max_cycles: Option<u64>,
    print_stats: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut engine = Engine::from_config(config)?;
    let mut provider = build_provider(config);

    let period = Duration::from_secs(config.update_every());
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(
        "Starting collection every {}s (file charts: {}, membership: {})",
        period.as_secs(),
        engine.features().descriptor_accounting,
        engine.features().membership_tracking
    );

    let mut completed = 0u64;
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = signal::ctrl_c() => {
                info!("Received Ctrl-C, stopping collection");
                break;
            }
        }

        let snapshot = match provider.snapshot() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!("Skipping cycle, snapshot failed: {}", e);
                continue;
            }
        };

        let summary = match engine.run_cycle(&snapshot) {
            Ok(summary) => summary,
            Err(e) => {
                error!("Collection cycle aborted: {}", e);
                return Err(e.into());
            }
        };

        info!(
            "Cycle {}: {} processes, {} app targets, {} removed",
            completed + 1,
            summary.ingest.observed,
            summary.apps_groups_targets_count,
            summary.reclaimed.removed
        );
        for (_, target) in engine
            .targets()
            .reporting_apps_targets()
            .filter(|(_, t)| !t.is_hidden() && !t.values().is_zero())
        {
            debug!(
                "{}: processes={} threads={} cpu_user={} vm_rss={}",
                target.name(),
                target.value(Metric::Processes),
                target.value(Metric::Threads),
                target.value(Metric::CpuUser),
                target.value(Metric::VmRss)
            );
        }

        completed += 1;
        if max_cycles.is_some_and(|max| completed >= max) {
            break;
        }
    }

    if print_stats {
        print!("{}", engine.stats().render_table());
    }
    Ok(())
}
