//! Tree fallback targets for processes no rule claims.

use crate::process::{ProcessId, ProcessTable};
use crate::targets::{TargetId, TargetRegistry};

/// Pid of init; its direct children head their own trees.
pub const INIT_PID: u32 = 1;

/// Resolves a target for a process that matched no rule and inherited none.
/// Implementations must always return a target that exists in `registry`.
pub trait TreeResolver {
    fn resolve(&mut self, table: &ProcessTable, id: ProcessId, registry: &mut TargetRegistry) -> TargetId;
}

/// Groups a process with the top of its lineage: walk up while the parent is
/// neither init, pid 0, nor a process manager, then use the reached
/// ancestor's name.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineageResolver;

impl LineageResolver {
    /// Handle of the ancestor that names the tree `id` belongs to.
    pub fn tree_root(table: &ProcessTable, id: ProcessId) -> ProcessId {
        let mut current = id;
        // bounded by table size so a corrupted ppid cycle cannot spin forever
        for _ in 0..table.len() {
            let Some(parent_id) = table.parent(current) else {
                break;
            };
            let Some(parent) = table.get(parent_id) else {
                break;
            };
            if parent.pid == INIT_PID || parent.pid == 0 || parent.is_process_manager {
                break;
            }
            current = parent_id;
        }
        current
    }
}

impl TreeResolver for LineageResolver {
    fn resolve(&mut self, table: &ProcessTable, id: ProcessId, registry: &mut TargetRegistry) -> TargetId {
        let root = Self::tree_root(table, id);
        let name = table
            .get(root)
            .or_else(|| table.get(id))
            .map(|p| p.comm.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or("unknown");
        registry.tree_target(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fds::FileTable;
    use crate::process::{ManagerSet, ProcessSample, Snapshot};

    fn table(samples: Vec<ProcessSample>) -> ProcessTable {
        let mut t = ProcessTable::new();
        t.apply_snapshot(
            &Snapshot {
                processes: samples,
                keep: Vec::new(),
            },
            &ManagerSet::default(),
            &mut FileTable::new(),
            false,
        );
        t
    }

    #[test]
    fn test_children_of_init_head_their_tree() {
        let t = table(vec![
            ProcessSample::new(1, 0, "init"),
            ProcessSample::new(100, 1, "sshd"),
            ProcessSample::new(200, 100, "sshd"),
            ProcessSample::new(300, 200, "bash"),
            ProcessSample::new(400, 300, "vim"),
        ]);
        let mut reg = TargetRegistry::new();
        let vim = t.find(400).unwrap();
        let target = LineageResolver.resolve(&t, vim, &mut reg);
        assert_eq!(reg.get(target).unwrap().name(), "sshd");
    }

    #[test]
    fn test_walk_stops_below_process_manager() {
        let t = table(vec![
            ProcessSample::new(1, 0, "systemd"),
            ProcessSample::new(50, 1, "containerd-shim"),
            ProcessSample::new(60, 50, "java"),
            ProcessSample::new(70, 60, "sh"),
        ]);
        let mut reg = TargetRegistry::new();
        let target = LineageResolver.resolve(&t, t.find(70).unwrap(), &mut reg);
        assert_eq!(reg.get(target).unwrap().name(), "java");
    }

    #[test]
    fn test_orphan_names_itself() {
        let t = table(vec![ProcessSample::new(900, 899, "orphan")]);
        let mut reg = TargetRegistry::new();
        let target = LineageResolver.resolve(&t, t.find(900).unwrap(), &mut reg);
        assert_eq!(reg.get(target).unwrap().name(), "orphan");
    }
}
