//! Running statistics over polling cycles, rendered for `/health`.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use crate::collector::CycleReport;

#[derive(Clone, Copy, Default)]
struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    fn add(&mut self, value: f64) {
        if self.count == 0 {
            *self = Self {
                count: 1,
                sum: value,
                min: value,
                max: value,
                last: value,
            };
            return;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Current, average, max and min of one series.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatSnapshot {
    pub current: f64,
    pub avg: f64,
    pub max: f64,
    pub min: f64,
}

#[derive(Default)]
struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    fn snapshot(&self) -> StatSnapshot {
        match self.inner.lock() {
            Ok(s) => StatSnapshot {
                current: s.last,
                avg: s.avg(),
                max: s.max,
                min: s.min,
            },
            Err(_) => StatSnapshot::default(),
        }
    }
}

pub struct HealthStats {
    instances: Stat,
    samples: Stat,
    failures: Stat,
    cycle_duration_seconds: Stat,
    total_cycles: AtomicU64,
    http_requests: AtomicU64,
    started: Instant,
}

impl Default for HealthStats {
    fn default() -> Self {
        Self {
            instances: Stat::default(),
            samples: Stat::default(),
            failures: Stat::default(),
            cycle_duration_seconds: Stat::default(),
            total_cycles: AtomicU64::new(0),
            http_requests: AtomicU64::new(0),
            started: Instant::now(),
        }
    }
}

impl HealthStats {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn record_cycle(&self, report: &CycleReport) {
        self.instances.add_sample(report.instances as f64);
        self.samples.add_sample(report.samples as f64);
        self.failures.add_sample(report.failures as f64);
        self.cycle_duration_seconds
            .add_sample(report.duration.as_secs_f64());
        self.total_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_http_request(&self) {
        self.http_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_cycles(&self) -> u64 {
        self.total_cycles.load(Ordering::Relaxed)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }

    pub fn samples(&self) -> StatSnapshot {
        self.samples.snapshot()
    }

    pub fn failures(&self) -> StatSnapshot {
        self.failures.snapshot()
    }

    pub fn render_table(&self) -> String {
        let left_col = 26usize;
        let col_w = 12usize;

        let mut out = String::new();

        writeln!(
            out,
            "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
            "metric",
            "current",
            "average",
            "max",
            "min",
            left = left_col,
            col = col_w
        )
        .ok();
        writeln!(out, "{}", "-".repeat(left_col + 3 + (col_w + 3) * 4)).ok();

        let rows = [
            ("instances per cycle", self.instances.snapshot(), 0usize),
            ("samples per cycle", self.samples.snapshot(), 0),
            ("failures per cycle", self.failures.snapshot(), 0),
            ("cycle duration (s)", self.cycle_duration_seconds.snapshot(), 3),
        ];
        for (label, s, precision) in rows {
            // Averages of counts get one decimal.
            let avg_precision = precision.max(1);
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                label,
                format!("{:.p$}", s.current, p = precision),
                format!("{:.p$}", s.avg, p = avg_precision),
                format!("{:.p$}", s.max, p = precision),
                format!("{:.p$}", s.min, p = precision),
                left = left_col,
                col = col_w
            )
            .ok();
        }

        writeln!(out).ok();
        writeln!(out, "number of done cycles: {}", self.total_cycles()).ok();
        writeln!(out, "http requests served: {}", self.http_requests.load(Ordering::Relaxed)).ok();
        writeln!(out, "uptime: {}s", self.uptime_seconds()).ok();

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn report(instances: usize, samples: usize, failures: usize) -> CycleReport {
        CycleReport {
            instances,
            samples,
            failures,
            duration: Duration::from_millis(250),
            ..Default::default()
        }
    }

    #[test]
    fn test_running_stats() {
        let stats = HealthStats::new();
        stats.record_cycle(&report(3, 30, 0));
        stats.record_cycle(&report(2, 10, 3));

        assert_eq!(stats.total_cycles(), 2);
        let samples = stats.samples();
        assert_eq!(samples.current, 10.0);
        assert_eq!(samples.avg, 20.0);
        assert_eq!(samples.max, 30.0);
        assert_eq!(samples.min, 10.0);
        assert_eq!(stats.failures().max, 3.0);
    }

    #[test]
    fn test_render_table() {
        let stats = HealthStats::new();
        stats.record_cycle(&report(3, 30, 1));
        stats.record_http_request();

        let table = stats.render_table();
        assert!(table.contains("samples per cycle"));
        assert!(table.contains("0.250"));
        assert!(table.contains("number of done cycles: 1"));
        assert!(table.contains("http requests served: 1"));
    }
}
