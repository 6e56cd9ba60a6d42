//! Generate snapshot command implementation.
//!
//! Generates synthetic snapshot JSON files for testing.

use rand::seq::SliceRandom;
use rand::Rng;
use std::fs;
use std::path::PathBuf;
use tracing::debug;

use herakles_apps_aggregator::targets::load_apps_groups;
use herakles_apps_aggregator::targets::pattern::has_wildcards;
use herakles_apps_aggregator::{Config, Metric, MetricValues, ProcessSample, SnapshotDocument};

// Constants for generated value ranges
const MAX_CPU_TICKS: u64 = 500_000;
const MAX_FAULTS: u64 = 1_000_000;
const MAX_RSS_KB: u64 = 4 * 1024 * 1024;
const MAX_IO_BYTES: u64 = 50 * 1024 * 1024 * 1024;
const MAX_UPTIME: u64 = 30 * 24 * 3600;
const FIRST_PID: u32 = 1000;
const UNMATCHED_NAMES: &[&str] = &["bash", "sleep", "cat", "make", "cc1", "less", "vim"];

/// Generates a synthetic snapshot: an init process, a few processes per
/// configured group, unmatched processes, and children under each.
pub fn command_generate_snapshot(
    output: PathBuf,
    per_group: usize,
    others: usize,
    children: usize,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    debug!(
        "Generating snapshot: per_group={}, others={}, children={}, output={}",
        per_group,
        others,
        children,
        output.display()
    );

    let rules = load_apps_groups(config.apps_groups_file.as_deref())?;
    let mut rng = rand::thread_rng();
    let mut processes = vec![generate_process(&mut rng, 1, 0, "systemd")];
    let mut next_pid = FIRST_PID;

    let mut heads = Vec::new();
    for group in &rules.groups {
        let names: Vec<String> = group.matches.iter().filter_map(|t| sample_name(t)).collect();
        if names.is_empty() {
            continue;
        }
        for i in 0..per_group {
            heads.push(names[i % names.len()].clone());
        }
    }
    for _ in 0..others {
        if let Some(name) = UNMATCHED_NAMES.choose(&mut rng) {
            heads.push(name.to_string());
        }
    }

    for name in heads {
        let head_pid = next_pid;
        next_pid += 1;
        processes.push(generate_process(&mut rng, head_pid, 1, &name));

        for _ in 0..children {
            let child = if rng.gen_bool(0.5) {
                name.clone()
            } else {
                "worker".to_string()
            };
            processes.push(generate_process(&mut rng, next_pid, head_pid, &child));
            next_pid += 1;
        }
    }

    let document = SnapshotDocument::new(processes);
    let json_content = serde_json::to_string_pretty(&document)?;
    fs::write(&output, &json_content)?;

    println!(
        "✅ Generated snapshot: {} processes in {}",
        document.processes.len(),
        output.display()
    );
    Ok(())
}

/// A process name a token would match, if one can be derived from it.
fn sample_name(token: &str) -> Option<String> {
    let token = token.trim();
    if token.len() > 2 && token.starts_with('*') && token.ends_with('*') {
        // command line rules need a matching command line, not a name
        return None;
    }
    let core = token.trim_matches('*');
    if core.is_empty() || has_wildcards(core) {
        return None;
    }
    Some(if token.ends_with('*') {
        format!("{}d", core)
    } else {
        core.to_string()
    })
}

/// Generates one process with random but plausible values.
fn generate_process(rng: &mut impl Rng, pid: u32, ppid: u32, name: &str) -> ProcessSample {
    let uid = *[0u32, 33, 999, 1000].choose(rng).unwrap_or(&0);
    let values = MetricValues::zero()
        .with(Metric::CpuUser, rng.gen_range(0..MAX_CPU_TICKS))
        .with(Metric::CpuSystem, rng.gen_range(0..MAX_CPU_TICKS / 4))
        .with(Metric::MinorFaults, rng.gen_range(0..MAX_FAULTS))
        .with(Metric::MajorFaults, rng.gen_range(0..MAX_FAULTS / 100))
        .with(Metric::VmRss, rng.gen_range(1024..MAX_RSS_KB))
        .with(Metric::VmSize, rng.gen_range(MAX_RSS_KB..MAX_RSS_KB * 4))
        .with(Metric::LogicalRead, rng.gen_range(0..MAX_IO_BYTES))
        .with(Metric::LogicalWrite, rng.gen_range(0..MAX_IO_BYTES))
        .with(Metric::Uptime, rng.gen_range(1..MAX_UPTIME))
        .with(Metric::Processes, 1)
        .with(Metric::Threads, rng.gen_range(1..64));

    let mut sample = ProcessSample::new(pid, ppid, name);
    sample.uid = uid;
    sample.gid = uid;
    sample.values = values;
    sample.cmdline = Some(format!("/usr/bin/{}", name));
    sample
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_names_follow_token_shape() {
        assert_eq!(sample_name("nginx").as_deref(), Some("nginx"));
        assert_eq!(sample_name("httpd*").as_deref(), Some("httpdd"));
        assert_eq!(sample_name("*kafka*"), None);
        assert_eq!(sample_name("a?c"), None);
    }

    #[test]
    fn test_generated_snapshot_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("snap.json");
        command_generate_snapshot(output.clone(), 1, 2, 1, &Config::default()).unwrap();

        let doc = herakles_apps_aggregator::process::load_snapshot_from_file(&output).unwrap();
        assert!(doc.processes.iter().any(|p| p.pid == 1));
        assert!(doc.processes.len() > 3);
    }
}
