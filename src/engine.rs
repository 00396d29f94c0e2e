//! Diff & decision engine: turns two snapshots into a verdict.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::config::WatchConfig;
use crate::snapshot::{Diff, Snapshot};

/// Outcome of one evaluation.
///
/// `Indeterminate` carries the same exit signal as `Active` (the machine
/// must not suspend on uncertain data) but is reported separately so the
/// operator can tell "provably busy" from "cannot tell yet".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Idle,
    Active,
    Indeterminate,
}

/// Evaluates the current snapshot against the previous one.
///
/// `ticks_per_sec` converts elapsed wall time into the tick unit of the CPU
/// counters; the comparison logic itself is unit-agnostic as long as the
/// numerator and denominator agree.
///
/// The checks run in a fixed precedence order and the first terminal
/// condition wins.
pub fn decide(
    config: &WatchConfig,
    previous: Option<&Snapshot>,
    current: &Snapshot,
    ticks_per_sec: f64,
) -> Verdict {
    if current.observations.is_empty() {
        info!("No listed service was found. Server is allowed to shutdown...");
        return Verdict::Idle;
    }

    let previous = match previous {
        Some(prev) => prev,
        None => {
            warn!("Can't determine idle state. No history was found...");
            return Verdict::Indeterminate;
        }
    };

    debug!(
        "Validating clock values: before: {}; after: {}",
        previous.clock, current.clock
    );
    if current.clock <= previous.clock {
        warn!("Can't determine idle state. History timestamp is not ascending...");
        return Verdict::Indeterminate;
    }

    let time_diff_ns = current.clock - previous.clock;
    debug!("Time difference: {} ms", time_diff_ns / 1_000_000);
    let secs = time_diff_ns / 1_000_000_000;
    if secs == 0 {
        warn!("Can't determine idle state. History is too recent (< 1s)");
        return Verdict::Indeterminate;
    }
    if secs > config.max_interval_secs {
        warn!(
            "Can't determine idle state. History is more than {} s old...",
            config.max_interval_secs
        );
        return Verdict::Indeterminate;
    }

    // Aggregate per-pid deltas by matched rule. A pid with no history entry
    // (or whose command line changed, i.e. the pid was recycled) cannot be
    // assessed yet: wait for the next turn.
    let mut aggregated: BTreeMap<usize, Diff> = BTreeMap::new();
    for (pid, obs) in &current.observations {
        let old = match previous.observations.get(pid) {
            Some(old) => old,
            None => {
                info!("New service arrived (pid {})! Wait until next turn to check activity...", pid);
                return Verdict::Indeterminate;
            }
        };
        if old.argv != obs.argv {
            info!(
                "Pid {} was reused by another command! Wait until next turn to check activity...",
                pid
            );
            return Verdict::Indeterminate;
        }
        let delta = obs.diff(old);
        *aggregated.entry(current.pid_to_rule[pid]).or_default() += delta;
    }

    // Elapsed wall time in the counters' tick unit.
    let tick_basis = (time_diff_ns as f64 / 1e9) * ticks_per_sec;

    debug!("Comparing workload thresholds");
    for (&rule_idx, delta) in &aggregated {
        let rule = &config.rules[rule_idx];

        let cpu = delta.relative_time_pct(tick_basis);
        if cpu > rule.cpu_threshold_pct {
            info!(
                "Service '{}' is using {:.1}%. Server activity confirmed...",
                rule.name, cpu
            );
            return Verdict::Active;
        }
        debug!("Service '{}' is using {:.1}% ({})", rule.name, cpu, delta);

        if rule.disk_total_threshold != 0 {
            let bytes = delta.total_disk_bytes() / secs as i64;
            if bytes > rule.disk_total_threshold as i64 {
                info!(
                    "Service '{}' transferred {} disk bytes/s! Server activity confirmed...",
                    rule.name, bytes
                );
                return Verdict::Active;
            }
        }
        if rule.disk_read_threshold != 0 {
            let bytes = delta.disk_read_bytes / secs as i64;
            if bytes > rule.disk_read_threshold as i64 {
                info!(
                    "Service '{}' read {} disk bytes/s! Server activity confirmed...",
                    rule.name, bytes
                );
                return Verdict::Active;
            }
        }
        if rule.disk_write_threshold != 0 {
            let bytes = delta.disk_write_bytes / secs as i64;
            if bytes > rule.disk_write_threshold as i64 {
                info!(
                    "Service '{}' wrote {} disk bytes/s! Server activity confirmed...",
                    rule.name, bytes
                );
                return Verdict::Active;
            }
        }
    }

    info!("No listed service has significant workload. Server is allowed to shutdown...");
    Verdict::Idle
}
