//! Process scanning utilities for building snapshots from /proc.
//!
//! This module provides functions to scan the /proc filesystem for process
//! entries and read each one into a [`ProcessSample`]. Reads run in parallel
//! with rayon; a process that vanishes mid-read is simply skipped.

use once_cell::sync::Lazy;
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::SnapshotError;
use crate::fds::FdSample;
use crate::process::record::ProcessSample;
use crate::process::snapshot::{Snapshot, SnapshotProvider};
use crate::process::values::{Metric, MetricValues};

/// Kernel truncates `comm` to this many bytes.
const COMM_MAX_LEN: usize = 15;

/// Get system clock ticks per second (usually 100, but can vary).
fn get_clk_tck() -> f64 {
    #[cfg(unix)]
    {
        // SAFETY: sysconf is safe to call with _SC_CLK_TCK
        // Returns -1 on error, 0 if undefined - both are handled by the > 0 check
        unsafe {
            let tck = libc::sysconf(libc::_SC_CLK_TCK);
            if tck > 0 {
                return tck as f64;
            }
        }
    }
    100.0
}

/// System clock ticks per second.
pub static CLK_TCK: Lazy<f64> = Lazy::new(get_clk_tck);

/// Process entry representing a directory in /proc filesystem.
#[derive(Debug, Clone)]
pub struct ProcEntry {
    pub pid: u32,
    pub proc_path: PathBuf,
}

/// Scans /proc directory for process entries with numeric PIDs.
pub fn collect_proc_entries(root: &Path, max: Option<usize>) -> Vec<ProcEntry> {
    let mut out = Vec::new();
    if let Ok(entries) = fs::read_dir(root) {
        for entry in entries.flatten() {
            let p = entry.path();
            let name = match p.file_name().and_then(|s| s.to_str()) {
                Some(v) => v,
                None => continue,
            };
            if !name.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            let pid: u32 = match name.parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            out.push(ProcEntry { pid, proc_path: p });
            if let Some(maxp) = max {
                if out.len() >= maxp {
                    break;
                }
            }
        }
    }
    out
}

/// Fields of interest from /proc/<pid>/stat.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatFields {
    pub ppid: u32,
    pub minflt: u64,
    pub majflt: u64,
    pub utime: u64,
    pub stime: u64,
    pub threads: u64,
    pub starttime: u64,
    pub guest_time: u64,
}

/// Parses /proc/<pid>/stat. The command name may contain spaces and
/// parentheses, so fields are counted from the last `)`.
pub fn parse_stat(content: &str) -> Option<StatFields> {
    let rest = &content[content.rfind(')')? + 1..];
    let parts: Vec<&str> = rest.split_whitespace().collect();
    // parts[0] is field 3 (state)
    let field = |n: usize| -> u64 { parts.get(n - 3).and_then(|v| v.parse().ok()).unwrap_or(0) };
    if parts.len() < 20 {
        return None;
    }

    Some(StatFields {
        ppid: field(4) as u32,
        minflt: field(10),
        majflt: field(12),
        utime: field(14),
        stime: field(15),
        threads: field(20),
        starttime: field(22),
        guest_time: field(43),
    })
}

/// Fields of interest from /proc/<pid>/status, sizes in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusFields {
    pub uid: u32,
    pub gid: u32,
    pub vm_size: u64,
    pub vm_rss: u64,
    pub vm_shared: u64,
    pub vm_swap: u64,
    pub voluntary_ctxt_switches: u64,
    pub nonvoluntary_ctxt_switches: u64,
}

fn parse_kb(v: &str) -> u64 {
    v.split_whitespace()
        .next()
        .and_then(|n| n.parse::<u64>().ok())
        .unwrap_or(0)
        * 1024
}

fn parse_first_id(v: &str) -> u32 {
    v.split_whitespace()
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

pub fn parse_status(content: &str) -> StatusFields {
    let mut out = StatusFields::default();
    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        match key {
            "Uid" => out.uid = parse_first_id(value),
            "Gid" => out.gid = parse_first_id(value),
            "VmSize" => out.vm_size = parse_kb(value),
            "VmRSS" => out.vm_rss = parse_kb(value),
            "RssFile" | "RssShmem" => out.vm_shared += parse_kb(value),
            "VmSwap" => out.vm_swap = parse_kb(value),
            "voluntary_ctxt_switches" => {
                out.voluntary_ctxt_switches = value.trim().parse().unwrap_or(0)
            }
            "nonvoluntary_ctxt_switches" => {
                out.nonvoluntary_ctxt_switches = value.trim().parse().unwrap_or(0)
            }
            _ => {}
        }
    }
    out
}

/// Parses /proc/<pid>/io into (rchar, wchar, read_bytes, write_bytes).
pub fn parse_io(content: &str) -> (u64, u64, u64, u64) {
    let mut io = (0, 0, 0, 0);
    for line in content.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let v: u64 = value.trim().parse().unwrap_or(0);
        match key {
            "rchar" => io.0 = v,
            "wchar" => io.1 = v,
            "read_bytes" => io.2 = v,
            "write_bytes" => io.3 = v,
            _ => {}
        }
    }
    io
}

/// Soft "Max open files" limit from /proc/<pid>/limits.
pub fn parse_open_files_limit(content: &str) -> Option<u64> {
    content
        .lines()
        .find_map(|l| l.strip_prefix("Max open files"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|soft| soft.parse().ok())
}

/// Full command line with NUL separators turned into spaces.
pub fn parse_cmdline(content: &[u8]) -> Option<String> {
    let parts: Vec<&str> = content
        .split(|&b| b == 0u8)
        .filter(|s| !s.is_empty())
        .filter_map(|s| std::str::from_utf8(s).ok())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

/// Restores a `comm` the kernel truncated, using the executable name from the
/// command line when it extends the truncated name.
pub fn normalize_comm(raw: &str, cmdline: Option<&str>) -> String {
    if raw.len() < COMM_MAX_LEN {
        return raw.to_string();
    }
    let exe = cmdline
        .and_then(|c| c.split(' ').next())
        .and_then(|argv0| Path::new(argv0).file_name())
        .and_then(|n| n.to_str());
    match exe {
        Some(name) if name.len() > raw.len() && name.starts_with(raw) => name.to_string(),
        _ => raw.to_string(),
    }
}

fn read_fds(proc_path: &Path) -> Vec<FdSample> {
    let Ok(entries) = fs::read_dir(proc_path.join("fd")) else {
        return Vec::new();
    };
    entries
        .flatten()
        .filter_map(|e| {
            let fd: i32 = e.file_name().to_str()?.parse().ok()?;
            let link = fs::read_link(e.path()).ok()?;
            Some(FdSample {
                fd,
                link: link.to_string_lossy().into_owned(),
            })
        })
        .collect()
}

/// Reads system uptime in seconds from `<proc_root>/uptime`.
pub fn read_uptime(proc_root: &Path) -> Option<f64> {
    fs::read_to_string(proc_root.join("uptime"))
        .ok()?
        .split_whitespace()
        .next()?
        .parse()
        .ok()
}

/// Reads one process. Returns `None` if it exited while being read.
pub fn read_process(entry: &ProcEntry, system_uptime: f64, read_descriptors: bool) -> Option<ProcessSample> {
    let stat = parse_stat(&fs::read_to_string(entry.proc_path.join("stat")).ok()?)?;
    let raw_comm = fs::read_to_string(entry.proc_path.join("comm")).ok()?;
    let raw_comm = raw_comm.trim();
    let cmdline = fs::read(entry.proc_path.join("cmdline"))
        .ok()
        .and_then(|c| parse_cmdline(&c));
    let status = fs::read_to_string(entry.proc_path.join("status"))
        .map(|s| parse_status(&s))
        .unwrap_or_default();
    let (rchar, wchar, read_bytes, write_bytes) = fs::read_to_string(entry.proc_path.join("io"))
        .map(|s| parse_io(&s))
        .unwrap_or((0, 0, 0, 0));

    let comm = normalize_comm(raw_comm, cmdline.as_deref());
    let comm_orig = (comm != raw_comm).then(|| raw_comm.to_string());

    let started = stat.starttime as f64 / *CLK_TCK;
    let uptime = (system_uptime - started).max(0.0) as u64;

    let (fds, open_files_limit_percent) = if read_descriptors {
        let fds = read_fds(&entry.proc_path);
        let pct = fs::read_to_string(entry.proc_path.join("limits"))
            .ok()
            .and_then(|l| parse_open_files_limit(&l))
            .filter(|&limit| limit > 0)
            .map(|limit| fds.len() as f64 * 100.0 / limit as f64);
        (fds, pct)
    } else {
        (Vec::new(), None)
    };

    let values = MetricValues::zero()
        .with(Metric::CpuUser, stat.utime)
        .with(Metric::CpuSystem, stat.stime)
        .with(Metric::CpuGuest, stat.guest_time)
        .with(Metric::MinorFaults, stat.minflt)
        .with(Metric::MajorFaults, stat.majflt)
        .with(Metric::VmSize, status.vm_size)
        .with(Metric::VmRss, status.vm_rss)
        .with(Metric::VmShared, status.vm_shared)
        .with(Metric::VmSwap, status.vm_swap)
        .with(Metric::VoluntaryCtxSwitches, status.voluntary_ctxt_switches)
        .with(Metric::InvoluntaryCtxSwitches, status.nonvoluntary_ctxt_switches)
        .with(Metric::LogicalRead, rchar)
        .with(Metric::LogicalWrite, wchar)
        .with(Metric::PhysicalRead, read_bytes)
        .with(Metric::PhysicalWrite, write_bytes)
        .with(Metric::Uptime, uptime)
        .with(Metric::Processes, 1)
        .with(Metric::Threads, stat.threads)
        .with(Metric::OpenFds, fds.len() as u64);

    Some(ProcessSample {
        pid: entry.pid,
        ppid: stat.ppid,
        comm,
        comm_orig,
        cmdline,
        uid: status.uid,
        gid: status.gid,
        values,
        fds,
        open_files_limit_percent,
    })
}

/// Snapshot provider reading a live /proc tree.
#[derive(Debug, Clone)]
pub struct ProcScanner {
    root: PathBuf,
    max_processes: Option<usize>,
    read_descriptors: bool,
}

impl ProcScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            max_processes: None,
            read_descriptors: false,
        }
    }

    pub fn with_max_processes(mut self, max: Option<usize>) -> Self {
        self.max_processes = max;
        self
    }

    pub fn with_descriptors(mut self, enabled: bool) -> Self {
        self.read_descriptors = enabled;
        self
    }
}

impl SnapshotProvider for ProcScanner {
    fn snapshot(&mut self) -> Result<Snapshot, SnapshotError> {
        let system_uptime = read_uptime(&self.root).ok_or_else(|| SnapshotError::Io {
            path: self.root.join("uptime"),
            source: std::io::Error::other("cannot read system uptime"),
        })?;

        let entries = collect_proc_entries(&self.root, self.max_processes);
        debug!("Collected {} process entries from {}", entries.len(), self.root.display());

        let read_descriptors = self.read_descriptors;
        let processes: Vec<ProcessSample> = entries
            .par_iter()
            .filter_map(|entry| {
                let sample = read_process(entry, system_uptime, read_descriptors);
                if sample.is_none() {
                    debug!("Skipping process {}: exited while reading", entry.pid);
                }
                sample
            })
            .collect();

        Ok(Snapshot {
            processes,
            keep: Vec::new(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT: &str = "1234 (my (odd) proc) S 1 1234 1234 0 -1 4194560 \
        500 0 7 0 150 30 0 0 20 0 4 0 98765 1000000 200 18446744073709551615 \
        1 1 0 0 0 0 0 0 0 0 0 0 17 3 0 0 0 12 0 0 0 0 0 0 0 0 0";

    #[test]
    fn test_parse_stat_handles_parentheses_in_name() {
        let stat = parse_stat(STAT).unwrap();
        assert_eq!(stat.ppid, 1);
        assert_eq!(stat.minflt, 500);
        assert_eq!(stat.majflt, 7);
        assert_eq!(stat.utime, 150);
        assert_eq!(stat.stime, 30);
        assert_eq!(stat.threads, 4);
        assert_eq!(stat.starttime, 98765);
        assert_eq!(stat.guest_time, 12);
    }

    #[test]
    fn test_parse_stat_rejects_garbage() {
        assert!(parse_stat("no parens here").is_none());
        assert!(parse_stat("1 (x) S 1").is_none());
    }

    #[test]
    fn test_parse_status() {
        let status = "Name:\tnginx\nUid:\t33\t33\t33\t33\nGid:\t44\t44\t44\t44\n\
            VmSize:\t  1000 kB\nVmRSS:\t   200 kB\nRssFile:\t 50 kB\nRssShmem:\t 10 kB\n\
            VmSwap:\t 3 kB\nvoluntary_ctxt_switches:\t9\nnonvoluntary_ctxt_switches:\t2\n";
        let s = parse_status(status);
        assert_eq!(s.uid, 33);
        assert_eq!(s.gid, 44);
        assert_eq!(s.vm_size, 1000 * 1024);
        assert_eq!(s.vm_rss, 200 * 1024);
        assert_eq!(s.vm_shared, 60 * 1024);
        assert_eq!(s.vm_swap, 3 * 1024);
        assert_eq!(s.voluntary_ctxt_switches, 9);
        assert_eq!(s.nonvoluntary_ctxt_switches, 2);
    }

    #[test]
    fn test_parse_io_and_limits() {
        let io = "rchar: 10\nwchar: 20\nsyscr: 1\nread_bytes: 4096\nwrite_bytes: 8192\n";
        assert_eq!(parse_io(io), (10, 20, 4096, 8192));

        let limits = "Limit                     Soft Limit           Hard Limit           Units\n\
            Max open files            1024                 524288               files\n";
        assert_eq!(parse_open_files_limit(limits), Some(1024));
    }

    #[test]
    fn test_normalize_comm_restores_truncated_names() {
        let cmd = parse_cmdline(b"/usr/bin/kube-controller-manager\0--leader-elect\0");
        assert_eq!(cmd.as_deref(), Some("/usr/bin/kube-controller-manager --leader-elect"));
        assert_eq!(
            normalize_comm("kube-controller", cmd.as_deref()),
            "kube-controller-manager"
        );
        assert_eq!(normalize_comm("nginx", Some("nginx: worker process")), "nginx");
        assert_eq!(normalize_comm("kube-controller", None), "kube-controller");
    }

    #[test]
    fn test_scanner_reads_fake_proc_tree() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("uptime"), "1000.00 500.00\n").unwrap();
        let pdir = root.path().join("1234");
        fs::create_dir(&pdir).unwrap();
        fs::write(pdir.join("stat"), STAT).unwrap();
        fs::write(pdir.join("comm"), "my (odd) proc\n").unwrap();
        fs::write(pdir.join("cmdline"), b"/opt/odd\0-v\0").unwrap();
        fs::write(pdir.join("status"), "Uid:\t1000\t1000\t1000\t1000\nGid:\t100\t100\t100\t100\n").unwrap();
        fs::create_dir(root.path().join("self-not-a-pid")).unwrap();

        let mut scanner = ProcScanner::new(root.path());
        let snapshot = scanner.snapshot().unwrap();
        assert_eq!(snapshot.processes.len(), 1);

        let p = &snapshot.processes[0];
        assert_eq!(p.pid, 1234);
        assert_eq!(p.ppid, 1);
        assert_eq!(p.comm, "my (odd) proc");
        assert_eq!(p.cmdline.as_deref(), Some("/opt/odd -v"));
        assert_eq!(p.uid, 1000);
        assert_eq!(p.values[Metric::Processes], 1);
        assert_eq!(p.values[Metric::CpuUser], 150);
        assert!(p.fds.is_empty());
    }
}
