//! Assigns exactly one target to every tracked process.
//!
//! Classification runs in two passes over the table. The first tries the
//! configured rules on every unassigned record. The second gives each record
//! still without a target the target of its nearest classified ancestor, but
//! only when that ancestor was matched by a rule; anything else falls back to
//! a tree target from the [`TreeResolver`].
//!
//! Targets stick to a record for its whole lifetime, so each process is
//! classified once.

use tracing::{debug, error};

use crate::error::AggregatorError;
use crate::process::{ProcessId, ProcessTable};
use crate::targets::{TargetId, TargetRegistry, TreeResolver};

/// How the records classified in one call got their targets.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassifySummary {
    pub matched: usize,
    pub inherited: usize,
    pub fallback: usize,
}

impl ClassifySummary {
    pub fn total(&self) -> usize {
        self.matched + self.inherited + self.fallback
    }
}

/// Runs both passes and checks that every record ended up with a target the
/// registry knows. A violation aborts the cycle.
pub fn assign_targets(
    table: &mut ProcessTable,
    registry: &mut TargetRegistry,
    resolver: &mut dyn TreeResolver,
) -> Result<ClassifySummary, AggregatorError> {
    let mut summary = ClassifySummary::default();
    let ids = table.ids();

    for &id in &ids {
        let Some(record) = table.get_mut(id) else {
            continue;
        };
        if record.target.is_some() {
            continue;
        }
        if let Some(target) = registry.match_process(record) {
            record.target = Some(target);
            summary.matched += 1;
        }
    }

    for &id in &ids {
        let Some(record) = table.get(id) else {
            continue;
        };
        if record.target.is_some() {
            continue;
        }

        let inherited = if record.is_process_manager {
            None
        } else {
            inheritable_target(table, id)
        };

        let target = match inherited {
            Some(target) => {
                summary.inherited += 1;
                target
            }
            None => {
                summary.fallback += 1;
                resolver.resolve(table, id, registry)
            }
        };

        if let Some(record) = table.get_mut(id) {
            record.target = Some(target);
        }
    }

    verify_assignment(table, registry)?;

    if summary.total() > 0 {
        debug!(
            "Classified {} processes: {} by rule, {} inherited, {} by tree",
            summary.total(),
            summary.matched,
            summary.inherited,
            summary.fallback
        );
    }
    Ok(summary)
}

/// Target of the nearest classified ancestor of `id`, if that ancestor was
/// matched by a rule. The walk never crosses a process manager.
pub fn inheritable_target(table: &ProcessTable, id: ProcessId) -> Option<TargetId> {
    let mut current = table.parent(id);
    // a ppid cycle would otherwise never end
    let mut budget = table.len();

    while let Some(ancestor_id) = current {
        if budget == 0 {
            break;
        }
        budget -= 1;

        let ancestor = table.get(ancestor_id)?;
        if ancestor.is_process_manager {
            return None;
        }
        if let Some(target) = ancestor.target {
            return ancestor.matched_by_rule.then_some(target);
        }
        current = ancestor.parent;
    }
    None
}

fn verify_assignment(table: &ProcessTable, registry: &TargetRegistry) -> Result<(), AggregatorError> {
    for (_, record) in table.iter() {
        let valid = record.target.is_some_and(|t| registry.contains(t));
        if !valid {
            error!(
                "pid {} ({}) has no valid target after classification",
                record.pid, record.comm
            );
            return Err(AggregatorError::UnassignedProcess {
                pid: record.pid,
                comm: record.comm.clone(),
            });
        }
    }
    Ok(())
}
