//! CLI command implementations for herakles-apps-aggregator.
//!
//! This module provides implementations for all CLI subcommands:
//! - `run`: Interval collection loop
//! - `test`: A few cycles with a target report
//! - `groups`: Application group listing
//! - `check`: Configuration and system validation
//! - `generate`: Synthetic snapshot generation

pub mod check;
pub mod generate;
pub mod groups;
pub mod run;
pub mod test;

// Re-export command functions
pub use check::command_check;
pub use generate::command_generate_snapshot;
pub use groups::command_groups;
pub use run::command_run;
pub use test::command_test;

use herakles_apps_aggregator::{Config, ProcScanner, SnapshotFile, SnapshotProvider};
use tracing::info;

/// Snapshot source selected by configuration: a JSON snapshot file when one
/// is configured, the /proc scanner otherwise.
pub fn build_provider(config: &Config) -> Box<dyn SnapshotProvider + Send> {
    match config.snapshot_file.as_ref() {
        Some(path) => {
            info!("Reading processes from snapshot file {}", path.display());
            Box::new(SnapshotFile::new(path.clone()))
        }
        None => {
            let root = config.proc_root();
            info!("Reading processes from {}", root.display());
            Box::new(
                ProcScanner::new(root)
                    .with_max_processes(config.max_processes)
                    .with_descriptors(config.features().descriptor_accounting),
            )
        }
    }
}
