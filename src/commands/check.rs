//! Check command implementation.
//!
//! Validates configuration, rules and /proc access.

use herakles_apps_aggregator::process::collect_proc_entries;
use herakles_apps_aggregator::targets::load_apps_groups;
use herakles_apps_aggregator::{validate_effective_config, Config, ProcScanner, SnapshotProvider};

/// Validates configuration, rules and optionally takes a live snapshot.
pub fn command_check(proc: bool, config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Herakles Apps Aggregator - System Check");
    println!("===========================================");

    let mut all_ok = true;

    // Check configuration
    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(_) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    // Check application group rules
    println!("\n📊 Checking application groups...");
    match load_apps_groups(config.apps_groups_file.as_deref()) {
        Ok(rules) => match rules.build_registry() {
            Ok(registry) => println!(
                "   ✅ {} groups, {} match rules loaded",
                rules.groups.len(),
                registry.apps_targets().count()
            ),
            Err(e) => {
                println!("   ❌ Invalid match rule: {}", e);
                all_ok = false;
            }
        },
        Err(e) => {
            println!("   ❌ Cannot load rules: {}", e);
            all_ok = false;
        }
    }

    // Check /proc filesystem
    let proc_root = config.proc_root();
    println!("\n📁 Checking {}...", proc_root.display());
    if proc_root.is_dir() {
        let entries = collect_proc_entries(&proc_root, Some(5));
        if entries.is_empty() {
            println!("   ❌ Cannot read any process entries");
            all_ok = false;
        } else {
            println!("   ✅ Can read {} process entries", entries.len());
        }

        if proc {
            let mut scanner = ProcScanner::new(&proc_root)
                .with_max_processes(config.max_processes)
                .with_descriptors(config.features().descriptor_accounting);
            match scanner.snapshot() {
                Ok(snapshot) => println!("   ✅ Snapshot read {} processes", snapshot.processes.len()),
                Err(e) => {
                    println!("   ❌ Snapshot failed: {}", e);
                    all_ok = false;
                }
            }
        }
    } else if config.snapshot_file.is_some() {
        println!("   ⚠️  Not a directory, but a snapshot file is configured");
    } else {
        println!("   ❌ Not a directory");
        all_ok = false;
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - system is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
