//! The aggregation engine: owns all cross-cycle state and runs cycles.
//!
//! One cycle is: ingest a snapshot, classify unassigned records, reset every
//! target, accumulate observed processes, then reclaim exited ones. A
//! classification failure aborts the cycle before any target is touched.

use std::time::Instant;
use tracing::{debug, info, instrument};

use crate::aggregator::{accumulate, reset_targets, AggregateSummary, Features};
use crate::classifier::{assign_targets, ClassifySummary};
use crate::config::Config;
use crate::error::AggregatorError;
use crate::fds::FileTable;
use crate::process::{IngestSummary, ManagerSet, ProcessTable, Snapshot};
use crate::reclaimer::{cleanup_exited, ReclaimSummary};
use crate::stats::CycleStats;
use crate::targets::{load_apps_groups, LineageResolver, TargetRegistry, TreeResolver};

/// Everything that happened during one cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub ingest: IngestSummary,
    pub classified: ClassifySummary,
    pub aggregated: AggregateSummary,
    pub reclaimed: ReclaimSummary,
    pub apps_groups_targets_count: usize,
}

pub struct Engine {
    processes: ProcessTable,
    targets: TargetRegistry,
    files: FileTable,
    managers: ManagerSet,
    resolver: Box<dyn TreeResolver + Send>,
    features: Features,
    keep_exited_children: bool,
    apps_groups_targets_count: usize,
    stats: CycleStats,
}

impl Engine {
    /// Engine over `targets` with default managers and the lineage resolver.
    pub fn new(targets: TargetRegistry) -> Self {
        Self {
            processes: ProcessTable::new(),
            targets,
            files: FileTable::new(),
            managers: ManagerSet::default(),
            resolver: Box::new(LineageResolver),
            features: Features::default(),
            keep_exited_children: true,
            apps_groups_targets_count: 0,
            stats: CycleStats::new(),
        }
    }

    /// Builds an engine from configuration, loading the rules it names.
    pub fn from_config(config: &Config) -> Result<Self, Box<dyn std::error::Error>> {
        let rules = load_apps_groups(config.apps_groups_file.as_deref())?;
        let targets = rules.build_registry()?;
        info!(
            "Loaded {} application groups with {} match rules",
            rules.groups.len(),
            rules.token_count()
        );

        Ok(Self::new(targets)
            .with_managers(ManagerSet::new(config.manager_names()))
            .with_features(config.features())
            .with_keep_exited_children(config.keep_exited_children()))
    }

    pub fn with_managers(mut self, managers: ManagerSet) -> Self {
        self.managers = managers;
        self
    }

    pub fn with_resolver(mut self, resolver: impl TreeResolver + Send + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn with_features(mut self, features: Features) -> Self {
        self.features = features;
        self
    }

    pub fn with_keep_exited_children(mut self, keep: bool) -> Self {
        self.keep_exited_children = keep;
        self
    }

    /// Applies a snapshot to the process table without classifying.
    pub fn ingest(&mut self, snapshot: &Snapshot) -> IngestSummary {
        self.processes.apply_snapshot(
            snapshot,
            &self.managers,
            &mut self.files,
            self.keep_exited_children,
        )
    }

    /// Classifies, aggregates and reclaims the current table.
    pub fn aggregate(&mut self) -> Result<CycleSummary, AggregatorError> {
        let classified = assign_targets(&mut self.processes, &mut self.targets, self.resolver.as_mut())?;

        self.apps_groups_targets_count = reset_targets(&mut self.targets);
        let aggregated = accumulate(&mut self.processes, &mut self.targets, &self.files, self.features);
        let reclaimed = cleanup_exited(&mut self.processes, &mut self.files);

        Ok(CycleSummary {
            classified,
            aggregated,
            reclaimed,
            apps_groups_targets_count: self.apps_groups_targets_count,
            ..Default::default()
        })
    }

    /// Runs one full cycle over `snapshot`.
    #[instrument(skip_all, fields(processes = snapshot.processes.len()))]
    pub fn run_cycle(&mut self, snapshot: &Snapshot) -> Result<CycleSummary, AggregatorError> {
        let start = Instant::now();
        let ingest = self.ingest(snapshot);

        let mut summary = match self.aggregate() {
            Ok(summary) => summary,
            Err(e) => {
                self.stats.record_failure();
                return Err(e);
            }
        };
        summary.ingest = ingest;

        let targets_used = self
            .targets
            .apps_targets()
            .filter(|(_, t)| !t.values().is_zero())
            .count();
        self.stats.assignment_attempts = self.targets.assignment_attempts();
        self.stats.record_cycle(
            start.elapsed().as_secs_f64() * 1000.0,
            ingest.observed,
            targets_used,
            summary.reclaimed.removed,
        );

        debug!(
            "Cycle done: {} observed, {} new, {} aggregated, {} removed, {} app targets",
            ingest.observed,
            ingest.added,
            summary.aggregated.aggregated,
            summary.reclaimed.removed,
            summary.apps_groups_targets_count
        );
        Ok(summary)
    }

    pub fn processes(&self) -> &ProcessTable {
        &self.processes
    }

    pub fn targets(&self) -> &TargetRegistry {
        &self.targets
    }

    pub fn files(&self) -> &FileTable {
        &self.files
    }

    pub fn features(&self) -> Features {
        self.features
    }

    /// Size of the application root at the last reset.
    pub fn apps_groups_targets_count(&self) -> usize {
        self.apps_groups_targets_count
    }

    pub fn stats(&self) -> &CycleStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::{Metric, ProcessSample};

    fn sample(pid: u32, ppid: u32, comm: &str, cpu: u64) -> ProcessSample {
        let mut s = ProcessSample::new(pid, ppid, comm);
        s.values[Metric::CpuUser] = cpu;
        s
    }

    #[test]
    fn test_cycle_publishes_app_root_size() {
        let mut registry = TargetRegistry::new();
        registry.add_app_group("web", "nginx").unwrap();
        registry.add_app_group("web", "httpd").unwrap();
        let mut engine = Engine::new(registry);

        let summary = engine
            .run_cycle(&Snapshot {
                processes: vec![sample(10, 1, "nginx", 1), sample(20, 1, "bash", 1)],
                keep: Vec::new(),
            })
            .unwrap();

        // two rules plus the tree target created for bash
        assert_eq!(summary.apps_groups_targets_count, 3);
        assert_eq!(engine.apps_groups_targets_count(), 3);
        assert_eq!(engine.stats().cycles, 1);
    }

    #[test]
    fn test_exited_process_is_removed_next_cycle() {
        let mut engine = Engine::new(TargetRegistry::new()).with_keep_exited_children(false);
        engine
            .run_cycle(&Snapshot {
                processes: vec![sample(10, 1, "a", 1)],
                keep: Vec::new(),
            })
            .unwrap();
        let summary = engine.run_cycle(&Snapshot::default()).unwrap();

        assert_eq!(summary.reclaimed.removed, 1);
        assert!(engine.processes().is_empty());
        assert_eq!(engine.stats().records_removed, 1);
    }
}
