//! Removal of records for processes that exited.
//!
//! A record not observed this cycle is removed right away unless it is marked
//! `keep`. A kept record survives exactly one stale cycle: the first time its
//! `keep_cycles` counter is bumped, the next stale cycle removes it.

use tracing::{debug, error};

use crate::fds::{release_process_fds, FileTable};
use crate::process::ProcessTable;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReclaimSummary {
    pub removed: usize,
    pub kept: usize,
}

/// Removes exited records and advances the grace counters of kept ones.
pub fn cleanup_exited(table: &mut ProcessTable, files: &mut FileTable) -> ReclaimSummary {
    let mut summary = ReclaimSummary::default();

    for id in table.ids() {
        let Some(record) = table.get_mut(id) else {
            continue;
        };

        if !record.updated && (!record.keep || record.keep_cycles > 0) {
            if record.keep || record.keep_cycles > 0 {
                debug!(
                    "Cannot keep exited process {} ({}) anymore, removing it",
                    record.pid, record.comm
                );
            }
            release_process_fds(&mut record.fds, files);

            if table.remove(id).is_none() {
                error!("Failed to remove record {:?} from the process table", id);
                continue;
            }
            summary.removed += 1;
        } else {
            if record.keep {
                record.keep_cycles += 1;
                summary.kept += 1;
            }
            record.keep = false;
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fds::FdSample;
    use crate::process::{ManagerSet, ProcessRecord, ProcessSample, Snapshot};

    #[test]
    fn test_live_records_stay() {
        let mut table = ProcessTable::new();
        let mut r = ProcessRecord::new(1, "a");
        r.updated = true;
        table.insert(r);

        let summary = cleanup_exited(&mut table, &mut FileTable::new());
        assert_eq!(summary.removed, 0);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_kept_record_survives_one_stale_cycle() {
        let mut table = ProcessTable::new();
        let mut files = FileTable::new();
        let mut r = ProcessRecord::new(1, "a");
        r.keep = true;
        let id = table.insert(r);

        let first = cleanup_exited(&mut table, &mut files);
        assert_eq!(first.kept, 1);
        let r = table.get(id).unwrap();
        assert_eq!(r.keep_cycles, 1);
        assert!(!r.keep);

        // marked again, but the grace cycle is used up
        table.get_mut(id).unwrap().keep = true;
        let second = cleanup_exited(&mut table, &mut files);
        assert_eq!(second.removed, 1);
        assert!(table.is_empty());
    }

    #[test]
    fn test_removal_releases_descriptors() {
        let mut table = ProcessTable::new();
        let mut files = FileTable::new();
        let mut sample = ProcessSample::new(7, 1, "db");
        sample.fds = vec![FdSample {
            fd: 3,
            link: "/var/lib/db/data".into(),
        }];
        table.apply_snapshot(
            &Snapshot {
                processes: vec![sample],
                keep: Vec::new(),
            },
            &ManagerSet::default(),
            &mut files,
            false,
        );
        assert_eq!(files.len(), 1);

        table.apply_snapshot(&Snapshot::default(), &ManagerSet::default(), &mut files, false);
        let summary = cleanup_exited(&mut table, &mut files);
        assert_eq!(summary.removed, 1);
        assert!(files.is_empty());
    }
}
