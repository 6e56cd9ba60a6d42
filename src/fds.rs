//! Open file descriptor accounting.
//!
//! Every distinct open file on the host gets one entry in a [`FileTable`],
//! shared by all processes holding it. Processes keep a list of
//! [`ProcessFd`] slots pointing into the table. During aggregation each file
//! is counted once per target, no matter how many member processes share it.

use ahash::AHashMap as HashMap;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::process::ProcessRecord;
use crate::targets::TargetRegistry;

/// Kind of an open descriptor, derived from its `/proc/<pid>/fd` link target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FdKind {
    File,
    Pipe,
    Socket,
    Inotify,
    EventFd,
    TimerFd,
    SignalFd,
    EventPoll,
    Other,
}

impl FdKind {
    /// Classifies a descriptor by the text of its link target.
    pub fn classify(link: &str) -> Self {
        if link.starts_with('/') {
            FdKind::File
        } else if link.starts_with("pipe:") {
            FdKind::Pipe
        } else if link.starts_with("socket:") {
            FdKind::Socket
        } else if let Some(anon) = link.strip_prefix("anon_inode:") {
            match anon.trim_matches(|c| c == '[' || c == ']') {
                "inotify" => FdKind::Inotify,
                "eventfd" => FdKind::EventFd,
                "timerfd" => FdKind::TimerFd,
                "signalfd" => FdKind::SignalFd,
                "eventpoll" => FdKind::EventPoll,
                _ => FdKind::Other,
            }
        } else {
            FdKind::Other
        }
    }
}

/// Open descriptor counts per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FdCounts {
    pub files: u64,
    pub pipes: u64,
    pub sockets: u64,
    pub inotifies: u64,
    pub eventfds: u64,
    pub timerfds: u64,
    pub signalfds: u64,
    pub eventpolls: u64,
    pub other: u64,
}

impl FdCounts {
    pub fn add(&mut self, kind: FdKind) {
        match kind {
            FdKind::File => self.files += 1,
            FdKind::Pipe => self.pipes += 1,
            FdKind::Socket => self.sockets += 1,
            FdKind::Inotify => self.inotifies += 1,
            FdKind::EventFd => self.eventfds += 1,
            FdKind::TimerFd => self.timerfds += 1,
            FdKind::SignalFd => self.signalfds += 1,
            FdKind::EventPoll => self.eventpolls += 1,
            FdKind::Other => self.other += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.files
            + self.pipes
            + self.sockets
            + self.inotifies
            + self.eventfds
            + self.timerfds
            + self.signalfds
            + self.eventpolls
            + self.other
    }
}

/// Handle of an entry in the [`FileTable`]. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(u32);

impl FileId {
    pub fn get(self) -> u32 {
        self.0
    }
}

/// One descriptor slot of a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessFd {
    pub fd: i32,
    pub file: FileId,
}

/// Descriptor as reported by a snapshot provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FdSample {
    pub fd: i32,
    pub link: String,
}

#[derive(Debug)]
struct OpenFile {
    kind: FdKind,
    link: String,
    usage: u32,
}

/// Host-wide table of open files, reference counted by process slots.
#[derive(Debug)]
pub struct FileTable {
    files: HashMap<FileId, OpenFile>,
    by_link: HashMap<String, FileId>,
    next_id: u32,
}

impl Default for FileTable {
    fn default() -> Self {
        Self {
            files: HashMap::new(),
            by_link: HashMap::new(),
            next_id: 1,
        }
    }
}

impl FileTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Finds or adds the file behind `link` and takes one usage reference.
    pub fn acquire(&mut self, link: &str) -> FileId {
        if let Some(&id) = self.by_link.get(link) {
            if let Some(file) = self.files.get_mut(&id) {
                file.usage += 1;
            }
            return id;
        }

        let id = self.allocate_id();
        self.files.insert(
            id,
            OpenFile {
                kind: FdKind::classify(link),
                link: link.to_string(),
                usage: 1,
            },
        );
        self.by_link.insert(link.to_string(), id);
        id
    }

    /// Next free id. Ids wrap around, skipping zero and ids still in use.
    fn allocate_id(&mut self) -> FileId {
        let mut candidate = self.next_id;
        while self.files.contains_key(&FileId(candidate)) {
            candidate = candidate.wrapping_add(1).max(1);
        }
        self.next_id = candidate.wrapping_add(1).max(1);
        FileId(candidate)
    }

    /// Drops one usage reference; the entry disappears with its last user.
    pub fn release(&mut self, id: FileId) {
        let Some(file) = self.files.get_mut(&id) else {
            error!(
                "INTERNAL ERROR: file id {} released but it is not in the open files table",
                id.0
            );
            return;
        };

        file.usage = file.usage.saturating_sub(1);
        if file.usage == 0 {
            if let Some(file) = self.files.remove(&id) {
                self.by_link.remove(&file.link);
            }
        }
    }

    pub fn kind(&self, id: FileId) -> Option<FdKind> {
        self.files.get(&id).map(|f| f.kind)
    }

    pub fn link(&self, id: FileId) -> Option<&str> {
        self.files.get(&id).map(|f| f.link.as_str())
    }

    pub fn usage(&self, id: FileId) -> u32 {
        self.files.get(&id).map(|f| f.usage).unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Descriptor accounting state carried by a target while accounting is on.
#[derive(Debug, Clone, Default)]
pub struct TargetFds {
    pub open: FdCounts,
    pub max_open_files_percent: f64,
    usage: HashMap<FileId, u32>,
}

impl TargetFds {
    pub fn clear(&mut self) {
        self.open = FdCounts::default();
        self.max_open_files_percent = 0.0;
        self.usage.clear();
    }

    /// Counts `file` once; later sightings only bump its usage.
    pub fn account(&mut self, file: FileId, kind: FdKind) {
        let usage = self.usage.entry(file).or_insert(0);
        if *usage == 0 {
            self.open.add(kind);
        }
        *usage += 1;
    }

    /// Number of member descriptors pointing at `file` this cycle.
    pub fn usage(&self, file: FileId) -> u32 {
        self.usage.get(&file).copied().unwrap_or(0)
    }
}

/// Brings a process's descriptor slots in line with the latest sample.
///
/// Slots whose fd number still points at the same file keep their table
/// reference; everything else is released and re-acquired.
pub fn sync_process_fds(current: &mut Vec<ProcessFd>, samples: &[FdSample], files: &mut FileTable) {
    let mut next = Vec::with_capacity(samples.len());

    for sample in samples {
        let kept = current
            .iter()
            .position(|pfd| pfd.fd == sample.fd && files.link(pfd.file) == Some(sample.link.as_str()));

        match kept {
            Some(pos) => next.push(current.swap_remove(pos)),
            None => next.push(ProcessFd {
                fd: sample.fd,
                file: files.acquire(&sample.link),
            }),
        }
    }

    for stale in current.drain(..) {
        files.release(stale.file);
    }
    *current = next;
}

/// Releases every descriptor slot of a process.
pub fn release_process_fds(fds: &mut Vec<ProcessFd>, files: &mut FileTable) {
    for pfd in fds.drain(..) {
        files.release(pfd.file);
    }
}

/// Folds one process's descriptors into its group, user and group targets.
pub fn aggregate_process_fds(
    record: &mut ProcessRecord,
    files: &FileTable,
    registry: &mut TargetRegistry,
) {
    if !record.updated || record.fds.is_empty() {
        return;
    }

    let owners = [record.target, record.user_target, record.group_target];
    let mut counts = FdCounts::default();

    for pfd in &record.fds {
        if pfd.fd < 0 {
            continue;
        }
        let Some(kind) = files.kind(pfd.file) else {
            continue;
        };
        counts.add(kind);

        for id in owners.iter().flatten() {
            if let Some(target) = registry.get_mut(*id) {
                target.account_file(pfd.file, kind);
            }
        }
    }

    record.open_fds = Some(counts);
}
