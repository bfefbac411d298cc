//! CPU utilization tracking across cycles.
//!
//! The tracker lives for the whole process and remembers, per instance id,
//! the last cumulative CPU time observed and when. Entries for instances
//! that were not visited for `retention_cycles` consecutive cycles are
//! pruned when the collector closes a cycle.

use ahash::AHashMap as HashMap;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, PoisonError};
use tracing::debug;

use crate::inspector::CpuStats;

/// Default number of consecutive unobserved cycles before eviction.
pub const DEFAULT_RETENTION_CYCLES: u64 = 3;

#[derive(Debug, Clone, Copy)]
struct CpuObservation {
    cpu_time: i64,
    observed_at: DateTime<Utc>,
    last_seen_cycle: u64,
}

#[derive(Default)]
struct TrackerState {
    entries: HashMap<String, CpuObservation>,
    cycle: u64,
}

/// Process-lifetime map of instance id to its last CPU observation.
pub struct UtilizationTracker {
    state: Mutex<TrackerState>,
    retention_cycles: u64,
}

impl UtilizationTracker {
    pub fn new(retention_cycles: u64) -> Self {
        Self {
            state: Mutex::new(TrackerState::default()),
            retention_cycles: retention_cycles.max(1),
        }
    }

    /// Records `cpu` for `instance_id` at `now` and returns the utilization
    /// percentage since the previous observation (0 on first sight).
    ///
    /// The lookup and the update happen under one lock, so concurrent
    /// observations never lose an update.
    pub fn observe(&self, instance_id: &str, cpu: &CpuStats, now: DateTime<Utc>) -> f64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let cycle = state.cycle;
        let previous = state.entries.insert(
            instance_id.to_string(),
            CpuObservation {
                cpu_time: cpu.time,
                observed_at: now,
                last_seen_cycle: cycle,
            },
        );

        match previous {
            Some(prev) => cpu_utilization(prev.cpu_time, prev.observed_at, cpu, now),
            None => {
                debug!("First CPU observation for {}, establishing baseline", instance_id);
                0.0
            }
        }
    }

    /// Closes the current cycle: marks `observed` ids as seen, prunes stale
    /// entries and returns how many were evicted.
    pub fn end_cycle<'a>(&self, observed: impl IntoIterator<Item = &'a str>) -> usize {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let cycle = state.cycle;

        for id in observed {
            if let Some(entry) = state.entries.get_mut(id) {
                entry.last_seen_cycle = cycle;
            }
        }

        let before = state.entries.len();
        let retention = self.retention_cycles;
        state
            .entries
            .retain(|_, e| cycle.saturating_sub(e.last_seen_cycle) < retention);
        let pruned = before - state.entries.len();

        if pruned > 0 {
            debug!("Pruned {} stale utilization entries after cycle {}", pruned, cycle);
        }

        state.cycle += 1;
        pruned
    }

    pub fn contains(&self, instance_id: &str) -> bool {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .contains_key(instance_id)
    }

    pub fn len(&self) -> usize {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for UtilizationTracker {
    fn default() -> Self {
        Self::new(DEFAULT_RETENTION_CYCLES)
    }
}

/// Utilization in percent between two cumulative CPU observations.
///
/// A cumulative time lower than the previous one means the counter was
/// reset (instance restart); the raw value is then taken as time used.
/// Non-positive elapsed time and zero cores yield 0.
pub fn cpu_utilization(
    prev_time: i64,
    prev_at: DateTime<Utc>,
    cpu: &CpuStats,
    now: DateTime<Utc>,
) -> f64 {
    let elapsed = (now - prev_at).num_nanoseconds().unwrap_or(i64::MAX);
    if elapsed <= 0 || cpu.number == 0 {
        return 0.0;
    }

    let time_used = if cpu.time < prev_time {
        cpu.time
    } else {
        cpu.time.saturating_sub(prev_time)
    }
    .max(0);

    let cores_fraction = 1.0 / f64::from(cpu.number);
    100.0 * cores_fraction * time_used as f64 / elapsed as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn cpu(time: i64, number: u32) -> CpuStats {
        CpuStats { time, number }
    }

    #[test]
    fn test_first_observation_is_zero() {
        let tracker = UtilizationTracker::default();
        assert_eq!(tracker.observe("i-1", &cpu(123_456, 2), t0()), 0.0);
        assert!(tracker.contains("i-1"));
    }

    #[test]
    fn test_quarter_utilization_on_four_cores() {
        let tracker = UtilizationTracker::default();
        tracker.observe("i-1", &cpu(1000, 4), t0());

        let util = tracker.observe("i-1", &cpu(5000, 4), t0() + Duration::nanoseconds(4000));
        assert!((util - 25.0).abs() < 1e-9, "got {util}");
    }

    #[test]
    fn test_counter_reset_uses_raw_time() {
        let prev_at = t0();
        let now = prev_at + Duration::nanoseconds(1000);

        // time_used = 100 (not 100 - 9000), one core, 1000ns elapsed
        let util = cpu_utilization(9000, prev_at, &cpu(100, 1), now);
        assert!((util - 10.0).abs() < 1e-9, "got {util}");
        assert!(util >= 0.0);
    }

    #[test]
    fn test_non_positive_elapsed_is_zero() {
        assert_eq!(cpu_utilization(0, t0(), &cpu(5000, 1), t0()), 0.0);
        assert_eq!(
            cpu_utilization(0, t0(), &cpu(5000, 1), t0() - Duration::seconds(1)),
            0.0
        );
    }

    #[test]
    fn test_extreme_counters_do_not_overflow() {
        let now = t0() + Duration::nanoseconds(1);
        let util = cpu_utilization(-10, t0(), &cpu(i64::MAX, 1), now);
        assert!(util.is_finite() && util > 0.0, "got {util}");
    }

    #[test]
    fn test_zero_cores_is_zero() {
        let now = t0() + Duration::seconds(1);
        assert_eq!(cpu_utilization(0, t0(), &cpu(5000, 0), now), 0.0);
    }

    #[test]
    fn test_update_is_unconditional() {
        let tracker = UtilizationTracker::default();
        tracker.observe("i-1", &cpu(1000, 1), t0());
        tracker.observe("i-1", &cpu(2000, 1), t0() + Duration::nanoseconds(1000));

        // Baseline moved to 2000ns: another 1000ns over 1000ns is 100%.
        let util = tracker.observe("i-1", &cpu(3000, 1), t0() + Duration::nanoseconds(2000));
        assert!((util - 100.0).abs() < 1e-9, "got {util}");
    }

    #[test]
    fn test_stale_entries_pruned_after_retention() {
        let tracker = UtilizationTracker::new(2);
        tracker.observe("i-1", &cpu(1, 1), t0());
        tracker.observe("i-2", &cpu(1, 1), t0());
        assert_eq!(tracker.end_cycle(["i-1", "i-2"]), 0);

        // i-2 disappears.
        assert_eq!(tracker.end_cycle(["i-1"]), 0);
        assert!(tracker.contains("i-2"));
        assert_eq!(tracker.end_cycle(["i-1"]), 1);
        assert!(!tracker.contains("i-2"));
        assert!(tracker.contains("i-1"));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_observed_without_cpu_keeps_baseline() {
        let tracker = UtilizationTracker::new(1);
        tracker.observe("i-1", &cpu(1, 1), t0());
        tracker.end_cycle(["i-1"]);
        // Visited in the next cycle even though CPU collection failed.
        assert_eq!(tracker.end_cycle(["i-1"]), 0);
        assert!(tracker.contains("i-1"));
        assert_eq!(tracker.end_cycle(std::iter::empty()), 1);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_concurrent_observations_do_not_lose_entries() {
        let tracker = UtilizationTracker::default();
        std::thread::scope(|s| {
            for i in 0..16 {
                let tracker = &tracker;
                s.spawn(move || {
                    let id = format!("i-{i}");
                    for n in 0..50 {
                        tracker.observe(&id, &cpu(n, 1), t0() + Duration::nanoseconds(n));
                    }
                });
            }
        });
        assert_eq!(tracker.len(), 16);
    }
}
