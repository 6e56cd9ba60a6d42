//! Groups command implementation.
//!
//! Lists the configured application groups and their match rules.

use herakles_apps_aggregator::targets::{load_apps_groups, MatchRule};
use herakles_apps_aggregator::Config;

/// Lists application groups in matching order.
pub fn command_groups(
    verbose: bool,
    filter: Option<String>,
    config: &Config,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("📊 Herakles Apps Aggregator - Application Groups");
    println!("=================================================");

    let rules = load_apps_groups(config.apps_groups_file.as_deref())?;
    let mut shown = 0usize;

    for group in &rules.groups {
        if let Some(f) = &filter {
            if !group.name.contains(f.as_str()) {
                continue;
            }
        }
        shown += 1;

        let hidden = group.name.trim().starts_with('-');
        println!(
            "\n🏷️  Group: {}{}",
            group.name.trim().trim_start_matches('-'),
            if hidden { " (hidden)" } else { "" }
        );
        println!("{}", "─".repeat(50));

        if verbose {
            for token in &group.matches {
                match MatchRule::parse(&group.name, token) {
                    Ok(rule) => println!("   ├─ 🔍 {:<28} {:?}", token, rule.kind()),
                    Err(e) => println!("   ├─ ❌ {:<28} {}", token, e),
                }
            }
        } else {
            let examples: Vec<_> = group.matches.iter().take(4).map(String::as_str).collect();
            println!("   ├─ {} match rules", group.matches.len());
            if !examples.is_empty() {
                println!("   └─ Examples: {}", examples.join(", "));
            }
        }
    }

    println!(
        "\n📋 Total: {} match rules in {} groups ({} shown)",
        rules.token_count(),
        rules.groups.len(),
        shown
    );
    Ok(())
}
