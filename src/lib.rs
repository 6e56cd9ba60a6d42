//! Herakles Apps Aggregator Library
//!
//! Process classification and per-application metrics aggregation. Once per
//! interval a snapshot of all processes is taken; every process is assigned
//! to an application target (by rule, by inheritance from a rule-matched
//! ancestor, or by process-tree fallback) and its values are summed into that
//! target, its user target and its group target. Records of exited processes
//! are reclaimed after an optional one-cycle grace period.
//!
//! # Usage
//!
//! ```rust
//! use herakles_apps_aggregator::{Engine, Metric, ProcessSample, Snapshot, TargetRegistry};
//!
//! let mut registry = TargetRegistry::new();
//! registry.add_app_group("web", "nginx").unwrap();
//! let mut engine = Engine::new(registry);
//!
//! let mut nginx = ProcessSample::new(10, 1, "nginx");
//! nginx.values[Metric::CpuUser] = 5;
//! let mut worker = ProcessSample::new(11, 10, "worker");
//! worker.values[Metric::CpuUser] = 3;
//!
//! engine
//!     .run_cycle(&Snapshot { processes: vec![nginx, worker], keep: Vec::new() })
//!     .unwrap();
//!
//! let web = engine.targets().app_group("web").unwrap();
//! assert_eq!(web.value(Metric::CpuUser), 8);
//! ```

pub mod aggregator;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod fds;
pub mod process;
pub mod reclaimer;
pub mod stats;
pub mod targets;

// Re-export main types for convenience
pub use aggregator::{AggregateSummary, Features};
pub use classifier::{assign_targets, ClassifySummary};
pub use config::{load_config, validate_effective_config, Config, ConfigFormat};
pub use engine::{CycleSummary, Engine};
pub use error::{AggregatorError, RuleError, SnapshotError};
pub use fds::{FdCounts, FdKind, FdSample, FileTable};
pub use process::{
    ManagerSet, Metric, MetricValues, ProcScanner, ProcessId, ProcessRecord, ProcessSample,
    ProcessTable, ScriptedSnapshots, Snapshot, SnapshotDocument, SnapshotFile, SnapshotProvider,
};
pub use reclaimer::ReclaimSummary;
pub use stats::{CycleStats, RunningStat};
pub use targets::{
    LineageResolver, Target, TargetId, TargetKind, TargetRegistry, TreeResolver,
};
