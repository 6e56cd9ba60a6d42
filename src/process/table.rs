//! Process table: a generational arena of [`ProcessRecord`]s.
//!
//! Records refer to each other (parent links) and to targets only through
//! handles. A handle whose slot was freed and reused no longer resolves, so a
//! stale parent link reads as "no parent" instead of pointing at a stranger.

use ahash::AHashMap as HashMap;
use tracing::debug;

use crate::fds::{release_process_fds, sync_process_fds, FileTable};
use crate::process::managers::ManagerSet;
use crate::process::record::ProcessRecord;
use crate::process::snapshot::Snapshot;

/// Stable handle of a record in the [`ProcessTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProcessId {
    index: u32,
    generation: u32,
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    record: Option<ProcessRecord>,
}

/// Counters from applying one snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestSummary {
    pub observed: usize,
    pub added: usize,
    pub reused_pids: usize,
    pub kept: usize,
}

#[derive(Debug, Default)]
pub struct ProcessTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
    by_pid: HashMap<u32, ProcessId>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_pid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_pid.is_empty()
    }

    pub fn get(&self, id: ProcessId) -> Option<&ProcessRecord> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.record.as_ref())
    }

    pub fn get_mut(&mut self, id: ProcessId) -> Option<&mut ProcessRecord> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.record.as_mut())
    }

    pub fn find(&self, pid: u32) -> Option<ProcessId> {
        self.by_pid.get(&pid).copied()
    }

    pub fn by_pid(&self, pid: u32) -> Option<&ProcessRecord> {
        self.find(pid).and_then(|id| self.get(id))
    }

    /// Inserts `record`, replacing any record already holding its pid.
    pub fn insert(&mut self, record: ProcessRecord) -> ProcessId {
        if let Some(old) = self.find(record.pid) {
            self.remove(old);
        }

        let pid = record.pid;
        let id = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.record = Some(record);
                ProcessId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = self.slots.len() as u32;
                self.slots.push(Slot {
                    generation: 0,
                    record: Some(record),
                });
                ProcessId {
                    index,
                    generation: 0,
                }
            }
        };
        self.by_pid.insert(pid, id);
        id
    }

    /// Removes the record behind `id`, retiring the handle.
    pub fn remove(&mut self, id: ProcessId) -> Option<ProcessRecord> {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)?;
        let record = slot.record.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        if self.by_pid.get(&record.pid) == Some(&id) {
            self.by_pid.remove(&record.pid);
        }
        Some(record)
    }

    /// Handles of all records, in slot order.
    pub fn ids(&self) -> Vec<ProcessId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.record.is_some())
            .map(|(index, slot)| ProcessId {
                index: index as u32,
                generation: slot.generation,
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ProcessId, &ProcessRecord)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.record.as_ref().map(|record| {
                (
                    ProcessId {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    record,
                )
            })
        })
    }

    pub fn parent(&self, id: ProcessId) -> Option<ProcessId> {
        self.get(id).and_then(|r| r.parent)
    }

    /// Applies one cycle's snapshot: clears every `updated` flag, refreshes or
    /// creates the observed records, links parents and sets `keep` on exited
    /// processes that qualify for a grace cycle.
    pub fn apply_snapshot(
        &mut self,
        snapshot: &Snapshot,
        managers: &ManagerSet,
        files: &mut FileTable,
        keep_exited_children: bool,
    ) -> IngestSummary {
        let mut summary = IngestSummary::default();

        for slot in self.slots.iter_mut() {
            if let Some(record) = slot.record.as_mut() {
                record.updated = false;
            }
        }

        for sample in &snapshot.processes {
            let existing = self.find(sample.pid);
            let id = match existing.and_then(|id| self.get_mut(id).map(|r| (id, r))) {
                Some((id, record)) if !record.is_reused_by(sample) => {
                    record.refresh(sample);
                    id
                }
                Some((id, record)) => {
                    debug!(
                        "pid {} reused: '{}' is now '{}'",
                        sample.pid,
                        record.comm_orig,
                        sample.original_name()
                    );
                    release_process_fds(&mut record.fds, files);
                    *record = ProcessRecord::from_sample(sample);
                    summary.reused_pids += 1;
                    id
                }
                None => {
                    summary.added += 1;
                    self.insert(ProcessRecord::from_sample(sample))
                }
            };

            if let Some(record) = self.get_mut(id) {
                record.updated = true;
                record.is_process_manager = managers.is_manager(&record.comm);
                sync_process_fds(&mut record.fds, &sample.fds, files);
            }
            summary.observed += 1;
        }

        self.link_parents();

        for &pid in &snapshot.keep {
            if let Some(record) = self.find(pid).and_then(|id| self.get_mut(id)) {
                if !record.updated {
                    record.keep = true;
                }
            }
        }

        if keep_exited_children {
            let exited: Vec<ProcessId> = self
                .iter()
                .filter(|(_, r)| !r.updated)
                .filter(|(_, r)| {
                    r.parent
                        .and_then(|p| self.get(p))
                        .is_some_and(|parent| parent.updated)
                })
                .map(|(id, _)| id)
                .collect();
            for id in exited {
                if let Some(record) = self.get_mut(id) {
                    record.keep = true;
                }
            }
        }

        summary.kept = self.iter().filter(|(_, r)| r.keep).count();
        summary
    }

    fn link_parents(&mut self) {
        let links: Vec<(ProcessId, Option<ProcessId>)> = self
            .iter()
            .map(|(id, r)| {
                let parent = if r.ppid == 0 || r.ppid == r.pid {
                    None
                } else {
                    self.find(r.ppid)
                };
                (id, parent)
            })
            .collect();

        for (id, parent) in links {
            if let Some(record) = self.get_mut(id) {
                record.parent = parent;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::record::ProcessSample;

    fn snapshot(samples: Vec<ProcessSample>) -> Snapshot {
        Snapshot {
            processes: samples,
            ..Default::default()
        }
    }

    #[test]
    fn test_removed_handle_does_not_resolve_after_slot_reuse() {
        let mut table = ProcessTable::new();
        let a = table.insert(ProcessRecord::new(10, "a"));
        table.remove(a);
        let b = table.insert(ProcessRecord::new(11, "b"));

        assert!(table.get(a).is_none());
        assert_eq!(table.get(b).map(|r| r.pid), Some(11));
        assert!(table.find(10).is_none());
    }

    #[test]
    fn test_insert_replaces_same_pid() {
        let mut table = ProcessTable::new();
        let first = table.insert(ProcessRecord::new(10, "a"));
        let second = table.insert(ProcessRecord::new(10, "b"));

        assert_eq!(table.len(), 1);
        assert!(table.get(first).is_none());
        assert_eq!(table.get(second).map(|r| r.comm.as_str()), Some("b"));
    }

    #[test]
    fn test_apply_snapshot_links_parents_and_flags_updated() {
        let mut table = ProcessTable::new();
        let mut files = FileTable::new();
        let managers = ManagerSet::default();

        let summary = table.apply_snapshot(
            &snapshot(vec![
                ProcessSample::new(1, 0, "systemd"),
                ProcessSample::new(10, 1, "nginx"),
                ProcessSample::new(11, 10, "nginx"),
            ]),
            &managers,
            &mut files,
            true,
        );
        assert_eq!(summary.observed, 3);
        assert_eq!(summary.added, 3);

        let worker = table.by_pid(11).unwrap();
        let parent = worker.parent.and_then(|p| table.get(p)).unwrap();
        assert_eq!(parent.pid, 10);
        assert!(worker.updated);
        assert!(table.by_pid(1).unwrap().is_process_manager);
        assert!(table.by_pid(1).unwrap().parent.is_none());
    }

    #[test]
    fn test_exited_child_of_live_parent_is_kept() {
        let mut table = ProcessTable::new();
        let mut files = FileTable::new();
        let managers = ManagerSet::default();

        table.apply_snapshot(
            &snapshot(vec![
                ProcessSample::new(10, 1, "bash"),
                ProcessSample::new(11, 10, "make"),
            ]),
            &managers,
            &mut files,
            true,
        );
        let summary = table.apply_snapshot(
            &snapshot(vec![ProcessSample::new(10, 1, "bash")]),
            &managers,
            &mut files,
            true,
        );

        let child = table.by_pid(11).unwrap();
        assert!(!child.updated);
        assert!(child.keep);
        assert_eq!(summary.kept, 1);
    }

    #[test]
    fn test_keep_disabled_leaves_exited_children_unmarked() {
        let mut table = ProcessTable::new();
        let mut files = FileTable::new();
        let managers = ManagerSet::default();

        table.apply_snapshot(
            &snapshot(vec![
                ProcessSample::new(10, 1, "bash"),
                ProcessSample::new(11, 10, "make"),
            ]),
            &managers,
            &mut files,
            false,
        );
        table.apply_snapshot(
            &snapshot(vec![ProcessSample::new(10, 1, "bash")]),
            &managers,
            &mut files,
            false,
        );
        assert!(!table.by_pid(11).unwrap().keep);
    }

    #[test]
    fn test_pid_reuse_resets_classification() {
        let mut table = ProcessTable::new();
        let mut files = FileTable::new();
        let managers = ManagerSet::default();

        table.apply_snapshot(
            &snapshot(vec![ProcessSample::new(42, 1, "postgres")]),
            &managers,
            &mut files,
            true,
        );
        if let Some(id) = table.find(42) {
            let record = table.get_mut(id).unwrap();
            record.matched_by_rule = true;
        }

        let summary = table.apply_snapshot(
            &snapshot(vec![ProcessSample::new(42, 1, "redis-server")]),
            &managers,
            &mut files,
            true,
        );
        assert_eq!(summary.reused_pids, 1);
        let record = table.by_pid(42).unwrap();
        assert_eq!(record.comm, "redis-server");
        assert!(!record.matched_by_rule);
        assert!(record.target.is_none());
    }
}
