//! Process bookkeeping: samples, the record table and snapshot providers.
//!
//! This module provides:
//! - `values`: the fixed set of per-process metrics
//! - `record`: per-cycle samples and the records built from them
//! - `table`: the generational arena holding every tracked record
//! - `managers`: process-manager names that never head an application
//! - `snapshot`: the snapshot provider seam and its file-backed providers
//! - `scanner`: the `/proc` snapshot provider

pub mod managers;
pub mod record;
pub mod scanner;
pub mod snapshot;
pub mod table;
pub mod values;

pub use managers::{ManagerSet, DEFAULT_MANAGERS};
pub use record::{ProcessRecord, ProcessSample};
pub use scanner::{collect_proc_entries, ProcScanner, CLK_TCK};
pub use snapshot::{
    load_snapshot_from_file, ScriptedSnapshots, Snapshot, SnapshotDocument, SnapshotFile,
    SnapshotProvider, SNAPSHOT_VERSION,
};
pub use table::{IngestSummary, ProcessId, ProcessTable};
pub use values::{Metric, MetricValues, METRIC_COUNT};
