//! Process records tracked across collection cycles.

use serde::{Deserialize, Serialize};

use crate::fds::{FdCounts, FdSample, ProcessFd};
use crate::process::table::ProcessId;
use crate::process::values::MetricValues;
use crate::targets::TargetId;

/// One process as reported by a snapshot provider for the current cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProcessSample {
    pub pid: u32,
    #[serde(default)]
    pub ppid: u32,
    /// Normalized command name.
    pub comm: String,
    /// Name as the kernel reported it, when normalization changed it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comm_orig: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cmdline: Option<String>,
    #[serde(default)]
    pub uid: u32,
    #[serde(default)]
    pub gid: u32,
    #[serde(default)]
    pub values: MetricValues,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fds: Vec<FdSample>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub open_files_limit_percent: Option<f64>,
}

impl ProcessSample {
    pub fn new(pid: u32, ppid: u32, comm: &str) -> Self {
        Self {
            pid,
            ppid,
            comm: comm.to_string(),
            ..Default::default()
        }
    }

    /// Name that identifies the process for its whole lifetime.
    pub fn original_name(&self) -> &str {
        self.comm_orig.as_deref().unwrap_or(&self.comm)
    }
}

/// Bookkeeping for one live or recently exited process.
#[derive(Debug, Clone)]
pub struct ProcessRecord {
    pub pid: u32,
    pub ppid: u32,
    pub comm: String,
    pub comm_orig: String,
    pub cmdline: Option<String>,
    pub uid: u32,
    pub gid: u32,

    /// Observed in the current cycle.
    pub updated: bool,
    pub keep: bool,
    pub keep_cycles: u32,

    pub target: Option<TargetId>,
    pub user_target: Option<TargetId>,
    pub group_target: Option<TargetId>,
    pub matched_by_rule: bool,

    pub parent: Option<ProcessId>,
    pub is_process_manager: bool,

    pub values: MetricValues,

    pub fds: Vec<ProcessFd>,
    pub open_fds: Option<FdCounts>,
    pub open_files_limit_percent: Option<f64>,
}

impl ProcessRecord {
    pub fn new(pid: u32, comm: &str) -> Self {
        Self {
            pid,
            ppid: 0,
            comm: comm.to_string(),
            comm_orig: comm.to_string(),
            cmdline: None,
            uid: 0,
            gid: 0,
            updated: false,
            keep: false,
            keep_cycles: 0,
            target: None,
            user_target: None,
            group_target: None,
            matched_by_rule: false,
            parent: None,
            is_process_manager: false,
            values: MetricValues::zero(),
            fds: Vec::new(),
            open_fds: None,
            open_files_limit_percent: None,
        }
    }

    /// Fresh record for a process first seen in `sample`.
    pub fn from_sample(sample: &ProcessSample) -> Self {
        let mut record = Self::new(sample.pid, &sample.comm);
        record.comm_orig = sample.original_name().to_string();
        record.refresh(sample);
        record
    }

    /// Copies the per-cycle fields of `sample`. Classification state and
    /// descriptor slots are left alone.
    pub fn refresh(&mut self, sample: &ProcessSample) {
        self.ppid = sample.ppid;
        self.comm.clone_from(&sample.comm);
        self.cmdline.clone_from(&sample.cmdline);
        self.uid = sample.uid;
        self.gid = sample.gid;
        self.values = sample.values;
        self.open_files_limit_percent = sample.open_files_limit_percent;
    }

    /// Whether `sample` describes a different program reusing this pid.
    pub fn is_reused_by(&self, sample: &ProcessSample) -> bool {
        self.comm_orig != sample.original_name()
    }
}
