//! Aggregation targets and the registry that owns them.
//!
//! This module provides:
//! - `pattern`: glob patterns used by rules and process-manager names
//! - `rule`: application group match rules
//! - `registry`: the ordered target roots and rule matching
//! - `tree`: fallback targets derived from process lineage
//! - `users`: uid/gid name lookups for user and group targets
//! - `loader`: application group rule files

pub mod loader;
pub mod pattern;
pub mod registry;
pub mod rule;
pub mod tree;
pub mod users;

use std::collections::VecDeque;

use crate::fds::{FdKind, FileId, TargetFds};
use crate::process::values::{Metric, MetricValues};
use crate::process::ProcessRecord;

pub use loader::{load_apps_groups, parse_apps_groups, AppGroupDef, AppsGroupsFile};
pub use registry::TargetRegistry;
pub use rule::{MatchKind, MatchRule, Matcher};
pub use tree::{LineageResolver, TreeResolver};

/// Handle of a target in the [`TargetRegistry`]. Targets are never freed, so
/// handles stay valid for the registry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub(crate) u32);

impl TargetId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetKind {
    AppGroup,
    Tree,
    User,
    Group,
}

/// One aggregation bucket.
#[derive(Debug, Clone)]
pub struct Target {
    name: String,
    kind: TargetKind,
    rule: Option<MatchRule>,
    alias: Option<TargetId>,
    hidden: bool,
    uid: Option<u32>,
    gid: Option<u32>,

    values: MetricValues,
    uptime_min: u64,
    uptime_max: u64,
    members: VecDeque<u32>,
    fds: Option<TargetFds>,
}

impl Target {
    fn new(name: &str, kind: TargetKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            rule: None,
            alias: None,
            hidden: false,
            uid: None,
            gid: None,
            values: MetricValues::zero(),
            uptime_min: 0,
            uptime_max: 0,
            members: VecDeque::new(),
            fds: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TargetKind {
        self.kind
    }

    pub fn rule(&self) -> Option<&MatchRule> {
        self.rule.as_ref()
    }

    /// Reporting target this one redirects to, if any.
    pub fn alias(&self) -> Option<TargetId> {
        self.alias
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    pub fn uid(&self) -> Option<u32> {
        self.uid
    }

    pub fn gid(&self) -> Option<u32> {
        self.gid
    }

    pub fn values(&self) -> &MetricValues {
        &self.values
    }

    pub fn value(&self, metric: Metric) -> u64 {
        self.values[metric]
    }

    pub fn uptime_min(&self) -> u64 {
        self.uptime_min
    }

    pub fn uptime_max(&self) -> u64 {
        self.uptime_max
    }

    /// Pids aggregated this cycle, most recent first. Only filled while
    /// membership tracking is on.
    pub fn members(&self) -> &VecDeque<u32> {
        &self.members
    }

    pub fn fds(&self) -> Option<&TargetFds> {
        self.fds.as_ref()
    }

    pub fn max_open_files_percent(&self) -> f64 {
        self.fds.as_ref().map(|f| f.max_open_files_percent).unwrap_or(0.0)
    }

    pub(crate) fn fds_mut(&mut self) -> &mut TargetFds {
        self.fds.get_or_insert_with(TargetFds::default)
    }

    /// Zeroes everything accumulated during the previous cycle.
    pub fn reset(&mut self) {
        self.values.clear();
        self.uptime_min = 0;
        self.uptime_max = 0;
        if let Some(fds) = self.fds.as_mut() {
            fds.clear();
        }
        self.members.clear();
    }

    /// Folds one process's values into this target. A zero uptime bound
    /// counts as unset.
    pub fn accumulate(&mut self, record: &ProcessRecord, descriptor_accounting: bool) {
        if descriptor_accounting {
            if let Some(pct) = record.open_files_limit_percent {
                let fds = self.fds_mut();
                if pct > fds.max_open_files_percent {
                    fds.max_open_files_percent = pct;
                }
            }
        }

        self.values += &record.values;

        let uptime = record.values[Metric::Uptime];
        if self.uptime_min == 0 || uptime < self.uptime_min {
            self.uptime_min = uptime;
        }
        if self.uptime_max == 0 || self.uptime_max < uptime {
            self.uptime_max = uptime;
        }
    }

    pub fn push_member(&mut self, pid: u32) {
        self.members.push_front(pid);
    }

    pub(crate) fn account_file(&mut self, file: FileId, kind: FdKind) {
        self.fds_mut().account(file, kind);
    }
}
