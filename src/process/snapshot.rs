//! Snapshot sources feeding the collection cycle.
//!
//! A snapshot is the full list of processes observed in one sampling interval.
//! Besides the `/proc` scanner, snapshots can be replayed from JSON documents,
//! which is what the test command and the integration tests use.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::SnapshotError;
use crate::process::record::ProcessSample;

/// Format version written into snapshot documents.
pub const SNAPSHOT_VERSION: &str = "1";

/// Processes observed in one cycle.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub processes: Vec<ProcessSample>,
    /// Pids of exited processes the provider wants kept for one more cycle.
    pub keep: Vec<u32>,
}

/// Source of per-cycle process snapshots.
pub trait SnapshotProvider {
    fn snapshot(&mut self) -> Result<Snapshot, SnapshotError>;
}

/// Serialized snapshot document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotDocument {
    pub version: String,
    pub generated_at: String,
    pub processes: Vec<ProcessSample>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keep: Vec<u32>,
}

impl SnapshotDocument {
    pub fn new(processes: Vec<ProcessSample>) -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            generated_at: Utc::now().to_rfc3339(),
            processes,
            keep: Vec::new(),
        }
    }
}

impl From<SnapshotDocument> for Snapshot {
    fn from(doc: SnapshotDocument) -> Self {
        Snapshot {
            processes: doc.processes,
            keep: doc.keep,
        }
    }
}

/// Load a snapshot document from a JSON file.
pub fn load_snapshot_from_file(path: &Path) -> Result<SnapshotDocument, SnapshotError> {
    debug!("Loading snapshot from: {}", path.display());

    if !path.exists() {
        return Err(SnapshotError::NotFound(path.to_path_buf()));
    }

    let content = fs::read_to_string(path).map_err(|source| SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let doc: SnapshotDocument =
        serde_json::from_str(&content).map_err(|source| SnapshotError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    info!(
        "Loaded snapshot version {} from {} ({} processes)",
        doc.version,
        doc.generated_at,
        doc.processes.len()
    );
    Ok(doc)
}

/// Replays the same JSON snapshot file on every cycle, re-reading it each time
/// so it can be edited while the agent runs.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SnapshotProvider for SnapshotFile {
    fn snapshot(&mut self) -> Result<Snapshot, SnapshotError> {
        load_snapshot_from_file(&self.path).map(Snapshot::from)
    }
}

/// Serves a fixed sequence of snapshots, then empty ones.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSnapshots {
    queue: std::collections::VecDeque<Snapshot>,
}

impl ScriptedSnapshots {
    pub fn new(snapshots: impl IntoIterator<Item = Snapshot>) -> Self {
        Self {
            queue: snapshots.into_iter().collect(),
        }
    }
}

impl SnapshotProvider for ScriptedSnapshots {
    fn snapshot(&mut self) -> Result<Snapshot, SnapshotError> {
        Ok(self.queue.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::values::Metric;
    use std::io::Write;

    #[test]
    fn test_load_missing_file() {
        let err = load_snapshot_from_file(Path::new("/nonexistent/snapshot.json")).unwrap_err();
        assert!(matches!(err, SnapshotError::NotFound(_)));
    }

    #[test]
    fn test_snapshot_file_round_trip() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "version": "1",
                "generated_at": "2026-01-01T00:00:00Z",
                "processes": [
                    {{"pid": 10, "ppid": 1, "comm": "nginx", "values": {{"cpu_user": 5}}}},
                    {{"pid": 11, "ppid": 10, "comm": "worker", "uid": 33}}
                ],
                "keep": [12]
            }}"#
        )
        .unwrap();

        let mut provider = SnapshotFile::new(file.path());
        let snapshot = provider.snapshot().unwrap();
        assert_eq!(snapshot.processes.len(), 2);
        assert_eq!(snapshot.processes[0].values[Metric::CpuUser], 5);
        assert_eq!(snapshot.processes[1].uid, 33);
        assert_eq!(snapshot.keep, vec![12]);
    }

    #[test]
    fn test_invalid_json_is_a_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();
        let err = load_snapshot_from_file(file.path()).unwrap_err();
        assert!(matches!(err, SnapshotError::Parse { .. }));
    }

    #[test]
    fn test_scripted_snapshots_run_dry() {
        let mut provider = ScriptedSnapshots::new([Snapshot {
            processes: vec![ProcessSample::new(1, 0, "init")],
            keep: Vec::new(),
        }]);
        assert_eq!(provider.snapshot().unwrap().processes.len(), 1);
        assert!(provider.snapshot().unwrap().processes.is_empty());
    }
}
