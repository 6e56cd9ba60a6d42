//! Running statistics about collection cycles.

use std::fmt::Write as FmtWrite;
use std::time::Instant;

/// Running statistics for a single measurement.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
            self.last = value;
            self.sum = value;
            self.count = 1;
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        if value < self.min {
            self.min = value;
        }
        if value > self.max {
            self.max = value;
        }
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }

    pub fn last(&self) -> f64 {
        self.last
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    pub fn count(&self) -> u64 {
        self.count
    }
}

/// Statistics the engine keeps across cycles.
#[derive(Debug, Clone)]
pub struct CycleStats {
    pub cycle_duration_ms: RunningStat,
    pub processes_seen: RunningStat,
    pub targets_used: RunningStat,
    pub cycles: u64,
    pub failed_cycles: u64,
    pub records_removed: u64,
    pub assignment_attempts: u64,
    pub start_time: Instant,
}

impl Default for CycleStats {
    fn default() -> Self {
        Self {
            cycle_duration_ms: RunningStat::default(),
            processes_seen: RunningStat::default(),
            targets_used: RunningStat::default(),
            cycles: 0,
            failed_cycles: 0,
            records_removed: 0,
            assignment_attempts: 0,
            start_time: Instant::now(),
        }
    }
}

impl CycleStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cycle(&mut self, duration_ms: f64, processes: usize, targets_used: usize, removed: usize) {
        self.cycles += 1;
        self.cycle_duration_ms.add(duration_ms);
        self.processes_seen.add(processes as f64);
        self.targets_used.add(targets_used as f64);
        self.records_removed += removed as u64;
    }

    pub fn record_failure(&mut self) {
        self.failed_cycles += 1;
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn render_table(&self) -> String {
        let left_col = 22usize;
        let col_w = 12usize;
        let mut out = String::new();

        writeln!(out, "CYCLE STATISTICS").ok();
        writeln!(out, "================").ok();
        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();

        for (label, stat, precision) in [
            ("cycle_duration (ms)", &self.cycle_duration_ms, 3usize),
            ("processes_seen", &self.processes_seen, 0),
            ("targets_used", &self.targets_used, 0),
        ] {
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                label,
                format!("{:.p$}", stat.last(), p = precision),
                format!("{:.p$}", stat.avg(), p = precision.max(1)),
                format!("{:.p$}", stat.max(), p = precision),
                format!("{:.p$}", stat.min(), p = precision),
                left = left_col,
                col = col_w
            )
            .ok();
        }

        writeln!(out).ok();
        writeln!(out, "cycles: {} (failed: {})", self.cycles, self.failed_cycles).ok();
        writeln!(out, "records removed: {}", self.records_removed).ok();
        writeln!(out, "assignment attempts: {}", self.assignment_attempts).ok();
        writeln!(out, "uptime: {}s", self.uptime_seconds()).ok();
        out
    }
}
