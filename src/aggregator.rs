//! Per-cycle aggregation of process values into targets.
//!
//! Every cycle starts from zero: all targets in every root are reset, then
//! each process observed this cycle is added to its application target, its
//! user target and its group target.

use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::fds::{aggregate_process_fds, FileTable};
use crate::process::{ProcessRecord, ProcessTable};
use crate::targets::{TargetId, TargetRegistry};

/// Optional aggregation work, toggled at runtime.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    /// Count open descriptors per target and track the open-files limit.
    pub descriptor_accounting: bool,
    /// Record which pids were folded into each target.
    pub membership_tracking: bool,
}

/// Counters from one accumulation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AggregateSummary {
    pub aggregated: usize,
    pub skipped_stale: usize,
    pub missing_targets: usize,
    pub user_switches: usize,
    pub group_switches: usize,
}

/// Zeroes every target in every root. Returns the number of targets in the
/// application root.
pub fn reset_targets(registry: &mut TargetRegistry) -> usize {
    registry.reset_all()
}

/// Adds every process observed this cycle to its targets.
pub fn accumulate(
    table: &mut ProcessTable,
    registry: &mut TargetRegistry,
    files: &FileTable,
    features: Features,
) -> AggregateSummary {
    let mut summary = AggregateSummary::default();

    for id in table.ids() {
        let Some(record) = table.get_mut(id) else {
            continue;
        };
        if !record.updated {
            summary.skipped_stale += 1;
            continue;
        }

        match record.target {
            Some(target) => add_to_target(registry, target, record, features),
            None => {
                error!("pid {} ({}) was left without a target", record.pid, record.comm);
                summary.missing_targets += 1;
            }
        }

        if refresh_user_target(registry, record) {
            summary.user_switches += 1;
        }
        if let Some(target) = record.user_target {
            add_to_target(registry, target, record, features);
        }

        if refresh_group_target(registry, record) {
            summary.group_switches += 1;
        }
        if let Some(target) = record.group_target {
            add_to_target(registry, target, record, features);
        }

        if features.descriptor_accounting {
            aggregate_process_fds(record, files, registry);
        }

        summary.aggregated += 1;
    }

    summary
}

fn add_to_target(registry: &mut TargetRegistry, id: TargetId, record: &ProcessRecord, features: Features) {
    let Some(target) = registry.get_mut(id) else {
        error!(
            "pid {} ({}) points at unknown target {}",
            record.pid,
            record.comm,
            id.index()
        );
        return;
    };

    target.accumulate(record, features.descriptor_accounting);
    if features.membership_tracking {
        target.push_member(record.pid);
    }
}

/// Makes sure the cached user target still belongs to the process's uid.
/// Returns true when an existing target was replaced.
fn refresh_user_target(registry: &mut TargetRegistry, record: &mut ProcessRecord) -> bool {
    let current = record
        .user_target
        .and_then(|id| registry.get(id).map(|t| (t.uid(), t.name().to_string())));

    match current {
        Some((Some(uid), _)) if uid == record.uid => false,
        previous => {
            let switched = previous.is_some();
            if let Some((old_uid, old_name)) = previous {
                debug!(
                    "pid {} ({}) switched user from {} ({}) to {}",
                    record.pid,
                    record.comm,
                    old_uid.unwrap_or_default(),
                    old_name,
                    record.uid
                );
            }
            record.user_target = Some(registry.user_target(record.uid));
            switched
        }
    }
}

/// Group counterpart of [`refresh_user_target`].
fn refresh_group_target(registry: &mut TargetRegistry, record: &mut ProcessRecord) -> bool {
    let current = record
        .group_target
        .and_then(|id| registry.get(id).map(|t| (t.gid(), t.name().to_string())));

    match current {
        Some((Some(gid), _)) if gid == record.gid => false,
        previous => {
            let switched = previous.is_some();
            if let Some((old_gid, old_name)) = previous {
                debug!(
                    "pid {} ({}) switched group from {} ({}) to {}",
                    record.pid,
                    record.comm,
                    old_gid.unwrap_or_default(),
                    old_name,
                    record.gid
                );
            }
            record.group_target = Some(registry.group_target(record.gid));
            switched
        }
    }
}
