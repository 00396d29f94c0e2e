//! Point-in-time resource snapshots and the deltas between them.
//!
//! A [`Snapshot`] is built once per run from live process state (or decoded
//! from the history record) and never mutated afterwards; diffing two
//! snapshots produces separate [`Diff`] values.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::AddAssign;

use crate::config::WatchConfig;
use crate::matcher;

/// One live process's counters at sampling time.
///
/// The tick and byte counters are cumulative over the process lifetime and
/// never decrease while the pid refers to the same process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessObservation {
    pub pid: i32,
    pub argv: Vec<String>,
    pub cpu_ticks: u64,
    pub kernel_ticks: u64,
    pub disk_read_bytes: u64,
    pub disk_write_bytes: u64,
}

impl ProcessObservation {
    /// Delta against an older observation of the same process.
    ///
    /// Component-wise subtraction, clamped at zero: a counter that moved
    /// backwards (pid reused by an unrelated process, or a counter reset)
    /// contributes nothing rather than a negative credit.
    pub fn diff(&self, previous: &ProcessObservation) -> Diff {
        Diff {
            cpu_ticks: self.cpu_ticks.saturating_sub(previous.cpu_ticks) as i64,
            kernel_ticks: self.kernel_ticks.saturating_sub(previous.kernel_ticks) as i64,
            disk_read_bytes: self.disk_read_bytes.saturating_sub(previous.disk_read_bytes) as i64,
            disk_write_bytes: self.disk_write_bytes.saturating_sub(previous.disk_write_bytes)
                as i64,
        }
    }
}

/// Resource consumption delta between two observations, or the sum of such
/// deltas for every process matching one rule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Diff {
    pub cpu_ticks: i64,
    pub kernel_ticks: i64,
    pub disk_read_bytes: i64,
    pub disk_write_bytes: i64,
}

impl Diff {
    /// CPU+kernel time as a percentage of `tick_basis`, the elapsed wall
    /// time expressed in the same tick unit as the counters.
    pub fn relative_time_pct(&self, tick_basis: f64) -> f64 {
        ((self.cpu_ticks + self.kernel_ticks) as f64 * 100.0) / tick_basis
    }

    pub fn total_disk_bytes(&self) -> i64 {
        self.disk_read_bytes + self.disk_write_bytes
    }
}

impl AddAssign for Diff {
    fn add_assign(&mut self, other: Diff) {
        self.cpu_ticks += other.cpu_ticks;
        self.kernel_ticks += other.kernel_ticks;
        self.disk_read_bytes += other.disk_read_bytes;
        self.disk_write_bytes += other.disk_write_bytes;
    }
}

impl fmt::Display for Diff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cpu={} ticks, kernel={} ticks, read={} bytes, write={} bytes",
            self.cpu_ticks, self.kernel_ticks, self.disk_read_bytes, self.disk_write_bytes
        )
    }
}

/// One full capture: a monotonic clock value plus every matched process,
/// keyed by pid, with the rule index each pid matched.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    /// Monotonic nanosecond timestamp, captured once before enumeration.
    pub clock: u64,
    pub observations: BTreeMap<i32, ProcessObservation>,
    pub pid_to_rule: BTreeMap<i32, usize>,
}

impl Snapshot {
    /// Builds a snapshot by filtering an enumeration of live processes
    /// through the configured watch rules.
    ///
    /// Unmatched processes are dropped. `clock_now` must be captured before
    /// the enumeration started; a process starting mid-scan may or may not
    /// be included, which the decision engine tolerates.
    pub fn build<I>(config: &WatchConfig, clock_now: u64, processes: I) -> Self
    where
        I: IntoIterator<Item = ProcessObservation>,
    {
        let mut snapshot = Snapshot {
            clock: clock_now,
            observations: BTreeMap::new(),
            pid_to_rule: BTreeMap::new(),
        };
        for obs in processes {
            if let Some(rule_idx) = matcher::match_rules(&config.rules, &obs.argv) {
                snapshot.pid_to_rule.insert(obs.pid, rule_idx);
                snapshot.observations.insert(obs.pid, obs);
            }
        }
        snapshot
    }
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Clock = {} ns", self.clock)?;
        for (pid, obs) in &self.observations {
            writeln!(f, "Pid = {}", pid)?;
            writeln!(f, "\tCmd Line    = {}", obs.argv.join(" "))?;
            writeln!(f, "\tCPU Time    = {} ticks", obs.cpu_ticks)?;
            writeln!(f, "\tKernel Time = {} ticks", obs.kernel_ticks)?;
            writeln!(f, "\tDisk Read   = {} bytes", obs.disk_read_bytes)?;
            writeln!(f, "\tDisk Write  = {} bytes", obs.disk_write_bytes)?;
        }
        Ok(())
    }
}
