//! Test command implementation.
//!
//! Runs a few cycles back to back and displays the resulting targets.

use std::time::Instant;

use herakles_apps_aggregator::{Config, Engine, Metric, Target};

use super::build_provider;

const REPORT_METRICS: [Metric; 6] = [
    Metric::Processes,
    Metric::Threads,
    Metric::CpuUser,
    Metric::CpuSystem,
    Metric::VmRss,
    Metric::OpenFds,
];

/// Runs `iterations` cycles and prints the targets of the last one.
pub fn command_test(
    iterations: usize,
    verbose: bool,
    all: bool,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🧪 Herakles Apps Aggregator - Test Mode");
    println!("========================================");

    let mut engine = Engine::from_config(config)?;
    let mut provider = build_provider(config);

    for iteration in 1..=iterations.max(1) {
        println!("\n🔄 Iteration {}/{}:", iteration, iterations.max(1));

        let start = Instant::now();
        let snapshot = provider.snapshot()?;
        let summary = engine.run_cycle(&snapshot)?;
        let duration = start.elapsed();

        println!("   📁 Observed {} processes ({} new)", summary.ingest.observed, summary.ingest.added);
        println!(
            "   🏷️  Classified: {} by rule, {} inherited, {} by tree",
            summary.classified.matched, summary.classified.inherited, summary.classified.fallback
        );
        println!(
            "   🧹 Removed {} exited, kept {} for one more cycle",
            summary.reclaimed.removed, summary.reclaimed.kept
        );
        println!("   ⏱️  Cycle duration: {:.2}ms", duration.as_secs_f64() * 1000.0);
    }

    let targets = engine.targets();
    println!("\n📊 Application targets ({} in root):", engine.apps_groups_targets_count());
    print_header();
    for (_, target) in targets.reporting_apps_targets() {
        if target.is_hidden() || (!all && target.values().is_zero()) {
            continue;
        }
        print_row(target);
    }

    if verbose {
        println!("\n👤 User targets:");
        print_header();
        for (_, target) in targets.user_targets() {
            if all || !target.values().is_zero() {
                print_row(target);
            }
        }

        println!("\n👥 Group targets:");
        print_header();
        for (_, target) in targets.group_targets() {
            if all || !target.values().is_zero() {
                print_row(target);
            }
        }

        if engine.features().membership_tracking {
            println!("\n🔗 Membership:");
            for (_, target) in targets.reporting_apps_targets() {
                if !target.members().is_empty() {
                    println!("   ├─ {}: {:?}", target.name(), target.members());
                }
            }
        }
    }

    println!("\n✅ Test completed successfully");
    Ok(())
}

fn print_header() {
    print!("   {:<24}", "target");
    for metric in REPORT_METRICS {
        print!(" {:>14}", metric.name());
    }
    println!(" {:>10}", "uptime_max");
}

fn print_row(target: &Target) {
    print!("   {:<24}", target.name());
    for metric in REPORT_METRICS {
        print!(" {:>14}", target.value(metric));
    }
    println!(" {:>10}", target.uptime_max());
}
