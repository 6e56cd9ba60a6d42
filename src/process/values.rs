//! Fixed-shape metric vectors shared by process records and targets.
//!
//! Every process carries one `MetricValues` per cycle and every target
//! accumulates the same shape, so aggregation is a plain element-wise sum.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ops::{AddAssign, Index, IndexMut};

/// Number of tracked metric dimensions.
pub const METRIC_COUNT: usize = 19;

/// One tracked metric dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    CpuUser,
    CpuSystem,
    CpuGuest,
    MinorFaults,
    MajorFaults,
    VmSize,
    VmRss,
    VmShared,
    VmSwap,
    VoluntaryCtxSwitches,
    InvoluntaryCtxSwitches,
    LogicalRead,
    LogicalWrite,
    PhysicalRead,
    PhysicalWrite,
    Uptime,
    Processes,
    Threads,
    OpenFds,
}

impl Metric {
    pub const ALL: [Metric; METRIC_COUNT] = [
        Metric::CpuUser,
        Metric::CpuSystem,
        Metric::CpuGuest,
        Metric::MinorFaults,
        Metric::MajorFaults,
        Metric::VmSize,
        Metric::VmRss,
        Metric::VmShared,
        Metric::VmSwap,
        Metric::VoluntaryCtxSwitches,
        Metric::InvoluntaryCtxSwitches,
        Metric::LogicalRead,
        Metric::LogicalWrite,
        Metric::PhysicalRead,
        Metric::PhysicalWrite,
        Metric::Uptime,
        Metric::Processes,
        Metric::Threads,
        Metric::OpenFds,
    ];

    /// Short label used in reports.
    pub fn name(self) -> &'static str {
        match self {
            Metric::CpuUser => "cpu_user",
            Metric::CpuSystem => "cpu_system",
            Metric::CpuGuest => "cpu_guest",
            Metric::MinorFaults => "minor_faults",
            Metric::MajorFaults => "major_faults",
            Metric::VmSize => "vm_size",
            Metric::VmRss => "vm_rss",
            Metric::VmShared => "vm_shared",
            Metric::VmSwap => "vm_swap",
            Metric::VoluntaryCtxSwitches => "voluntary_ctx_switches",
            Metric::InvoluntaryCtxSwitches => "involuntary_ctx_switches",
            Metric::LogicalRead => "logical_read",
            Metric::LogicalWrite => "logical_write",
            Metric::PhysicalRead => "physical_read",
            Metric::PhysicalWrite => "physical_write",
            Metric::Uptime => "uptime",
            Metric::Processes => "processes",
            Metric::Threads => "threads",
            Metric::OpenFds => "open_fds",
        }
    }
}

/// Metric vector indexed by [`Metric`].
///
/// Serialized as a map of metric name to value; missing names read as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Metric, u64>", into = "BTreeMap<Metric, u64>")]
pub struct MetricValues([u64; METRIC_COUNT]);

impl MetricValues {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.0 = [0; METRIC_COUNT];
    }

    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|&v| v == 0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Metric, u64)> + '_ {
        Metric::ALL.iter().map(move |&m| (m, self.0[m as usize]))
    }

    /// Builder-style setter, handy for fixtures and synthetic snapshots.
    pub fn with(mut self, metric: Metric, value: u64) -> Self {
        self.0[metric as usize] = value;
        self
    }
}

impl Index<Metric> for MetricValues {
    type Output = u64;

    fn index(&self, metric: Metric) -> &u64 {
        &self.0[metric as usize]
    }
}

impl IndexMut<Metric> for MetricValues {
    fn index_mut(&mut self, metric: Metric) -> &mut u64 {
        &mut self.0[metric as usize]
    }
}

impl AddAssign<&MetricValues> for MetricValues {
    fn add_assign(&mut self, other: &MetricValues) {
        for (slot, value) in self.0.iter_mut().zip(other.0.iter()) {
            *slot = slot.saturating_add(*value);
        }
    }
}

impl From<BTreeMap<Metric, u64>> for MetricValues {
    fn from(map: BTreeMap<Metric, u64>) -> Self {
        let mut values = MetricValues::zero();
        for (metric, value) in map {
            values[metric] = value;
        }
        values
    }
}

impl From<MetricValues> for BTreeMap<Metric, u64> {
    fn from(values: MetricValues) -> Self {
        values.iter().filter(|(_, v)| *v != 0).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_assign_is_elementwise() {
        let mut total = MetricValues::zero().with(Metric::CpuUser, 5);
        let other = MetricValues::zero()
            .with(Metric::CpuUser, 3)
            .with(Metric::VmRss, 1024);
        total += &other;

        assert_eq!(total[Metric::CpuUser], 8);
        assert_eq!(total[Metric::VmRss], 1024);
        assert_eq!(total[Metric::Threads], 0);
    }

    #[test]
    fn test_add_assign_saturates() {
        let mut total = MetricValues::zero().with(Metric::LogicalRead, u64::MAX - 1);
        total += &MetricValues::zero().with(Metric::LogicalRead, 10);
        assert_eq!(total[Metric::LogicalRead], u64::MAX);
    }

    #[test]
    fn test_json_uses_metric_names_and_defaults_missing_to_zero() {
        let values: MetricValues =
            serde_json::from_str(r#"{"cpu_user": 7, "processes": 1}"#).unwrap();
        assert_eq!(values[Metric::CpuUser], 7);
        assert_eq!(values[Metric::Processes], 1);
        assert_eq!(values[Metric::VmSwap], 0);

        let json = serde_json::to_string(&values).unwrap();
        assert!(json.contains("\"cpu_user\":7"));
        assert!(!json.contains("vm_swap"));
    }

    #[test]
    fn test_clear_zeroes_everything() {
        let mut values = MetricValues::zero().with(Metric::Uptime, 99);
        assert!(!values.is_zero());
        values.clear();
        assert!(values.is_zero());
    }
}
