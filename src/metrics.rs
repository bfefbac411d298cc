//! Prometheus metrics definitions for herakles-compute-meter.
//!
//! Every sample of the latest cycle becomes one gauge series; the cycle
//! gauges describe the collector itself.

use herakles_compute_meter::{CycleReport, Sample};
use prometheus::{Gauge, GaugeVec, Opts, Registry};

/// Labels of the per-sample volume gauge.
pub const SAMPLE_LABELS: &[&str] = &[
    "meter",
    "unit",
    "type",
    "resource_id",
    "user_id",
    "project_id",
];

#[derive(Clone)]
pub struct MeterMetrics {
    pub volume: GaugeVec,
    pub samples_total: Gauge,

    // Last cycle
    pub cycle_instances: Gauge,
    pub cycle_failures: Gauge,
    pub cycle_duration: Gauge,
    pub cycle_success: Gauge,
    pub cycles_total: Gauge,
}

impl MeterMetrics {
    /// Creates and registers all metrics with the registry.
    pub fn new(registry: &Registry) -> anyhow::Result<Self> {
        let volume = GaugeVec::new(
            Opts::new(
                "herakles_compute_meter_volume",
                "Volume of each sample collected in the last cycle",
            ),
            SAMPLE_LABELS,
        )?;
        let samples_total = Gauge::new(
            "herakles_compute_meter_samples",
            "Number of samples collected in the last cycle",
        )?;
        let cycle_instances = Gauge::new(
            "herakles_compute_meter_cycle_instances",
            "Number of instances visited in the last cycle",
        )?;
        let cycle_failures = Gauge::new(
            "herakles_compute_meter_cycle_failures",
            "Producer/instance pairings that failed in the last cycle",
        )?;
        let cycle_duration = Gauge::new(
            "herakles_compute_meter_cycle_duration_seconds",
            "Time spent in the last polling cycle",
        )?;
        let cycle_success = Gauge::new(
            "herakles_compute_meter_cycle_success",
            "Whether the last cycle completed (1) or discovery failed (0)",
        )?;
        let cycles_total = Gauge::new(
            "herakles_compute_meter_cycles",
            "Number of completed polling cycles",
        )?;

        registry.register(Box::new(volume.clone()))?;
        registry.register(Box::new(samples_total.clone()))?;
        registry.register(Box::new(cycle_instances.clone()))?;
        registry.register(Box::new(cycle_failures.clone()))?;
        registry.register(Box::new(cycle_duration.clone()))?;
        registry.register(Box::new(cycle_success.clone()))?;
        registry.register(Box::new(cycles_total.clone()))?;

        Ok(Self {
            volume,
            samples_total,
            cycle_instances,
            cycle_failures,
            cycle_duration,
            cycle_success,
            cycles_total,
        })
    }

    /// Drops all sample series (used before populating with fresh data).
    pub fn reset(&self) {
        self.volume.reset();
    }

    pub fn set_samples(&self, samples: &[Sample]) {
        for sample in samples {
            let identity = sample.identity();
            self.volume
                .with_label_values(&[
                    sample.name(),
                    sample.unit(),
                    sample.kind().as_str(),
                    identity.resource_id.as_str(),
                    identity.user_id.as_str(),
                    identity.project_id.as_str(),
                ])
                .set(sample.volume().as_f64());
        }
        self.samples_total.set(samples.len() as f64);
    }

    pub fn set_cycle(&self, report: Option<&CycleReport>, success: bool, cycles: u64) {
        if let Some(report) = report {
            self.cycle_instances.set(report.instances as f64);
            self.cycle_failures.set(report.failures as f64);
            self.cycle_duration.set(report.duration.as_secs_f64());
        }
        self.cycle_success.set(if success { 1.0 } else { 0.0 });
        self.cycles_total.set(cycles as f64);
    }
}
