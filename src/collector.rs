//! Polling cycle orchestration.
//!
//! One cycle visits every discovered instance with every registered
//! producer, sharing a fresh [`CycleCache`] between them. A failing
//! producer/instance pairing is logged and counted, never propagated, so one
//! broken instance cannot starve the others. At the end of the cycle the
//! publisher is flushed and the utilization tracker prunes instances that
//! have disappeared.

use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

use crate::cache::CycleCache;
use crate::config::Config;
use crate::filter::MeterFilter;
use crate::inspector::Inspector;
use crate::instance::Instance;
use crate::producers::{default_producers, Producer, ProducerContext, Samples};
use crate::publisher::Publisher;
use crate::tracker::UtilizationTracker;

/// Outcome of one polling cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    pub instances: usize,
    pub samples: usize,
    /// Producer/instance pairings that failed.
    pub failures: usize,
    pub publish_failures: usize,
    /// Utilization tracker entries evicted at cycle end.
    pub pruned: usize,
    pub duration: Duration,
}

#[derive(Default)]
struct InstanceOutcome {
    samples: usize,
    failures: usize,
    publish_failed: bool,
}

pub struct Collector {
    producers: Vec<Box<dyn Producer>>,
    filter: MeterFilter,
    tracker: Arc<UtilizationTracker>,
    pool: Option<rayon::ThreadPool>,
    cycles: AtomicU64,
}

impl Collector {
    /// Keeps only the producers with at least one accepted sample name.
    pub fn new(
        producers: Vec<Box<dyn Producer>>,
        filter: MeterFilter,
        tracker: Arc<UtilizationTracker>,
    ) -> Self {
        let (producers, skipped): (Vec<_>, Vec<_>) = producers
            .into_iter()
            .partition(|p| filter.accepts_any(p.sample_names()));
        for p in &skipped {
            info!("Producer '{}' disabled by meter filter", p.name());
        }

        Self {
            producers,
            filter,
            tracker,
            pool: None,
            cycles: AtomicU64::new(0),
        }
    }

    /// Collects instances on a dedicated pool of `threads` workers.
    pub fn with_parallelism(mut self, threads: usize) -> anyhow::Result<Self> {
        self.pool = if threads > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .thread_name(|i| format!("meter-worker-{i}"))
                .build()?;
            Some(pool)
        } else {
            None
        };
        Ok(self)
    }

    /// Builds the default producer registry around `inspector`.
    pub fn from_config(inspector: Arc<dyn Inspector>, cfg: &Config) -> anyhow::Result<Self> {
        let ctx = ProducerContext::new(inspector, cfg.metadata_policy());
        let tracker = Arc::new(UtilizationTracker::new(cfg.retention_cycles()));
        Self::new(default_producers(&ctx, tracker.clone()), cfg.meter_filter(), tracker)
            .with_parallelism(cfg.parallelism())
    }

    pub fn producer_names(&self) -> Vec<&'static str> {
        self.producers.iter().map(|p| p.name()).collect()
    }

    pub fn tracker(&self) -> &Arc<UtilizationTracker> {
        &self.tracker
    }

    pub fn cycles(&self) -> u64 {
        self.cycles.load(Ordering::Relaxed)
    }

    /// Runs one polling cycle over `instances`, handing each instance's
    /// samples to `publisher` as one batch.
    pub fn run_cycle(&self, instances: &[Instance], publisher: &dyn Publisher) -> CycleReport {
        let start = Instant::now();
        let cycle = self.cycles.fetch_add(1, Ordering::Relaxed) + 1;
        let cache = CycleCache::new();

        let outcomes: Vec<InstanceOutcome> = match &self.pool {
            Some(pool) => pool.install(|| {
                instances
                    .par_iter()
                    .map(|instance| self.visit(&cache, instance, publisher))
                    .collect()
            }),
            None => instances
                .iter()
                .map(|instance| self.visit(&cache, instance, publisher))
                .collect(),
        };

        let mut report = CycleReport {
            cycle,
            instances: instances.len(),
            ..Default::default()
        };
        for outcome in &outcomes {
            report.samples += outcome.samples;
            report.failures += outcome.failures;
            report.publish_failures += usize::from(outcome.publish_failed);
        }

        if let Err(e) = publisher.flush() {
            error!("Failed to flush publisher after cycle {}: {:#}", cycle, e);
            report.publish_failures += 1;
        }

        report.pruned = self
            .tracker
            .end_cycle(instances.iter().map(|i| i.id.as_str()));
        report.duration = start.elapsed();

        info!(
            "Cycle {} done: {} instances, {} samples, {} failures in {:.3}s",
            cycle,
            report.instances,
            report.samples,
            report.failures,
            report.duration.as_secs_f64()
        );
        report
    }

    fn visit(&self, cache: &CycleCache, instance: &Instance, publisher: &dyn Publisher) -> InstanceOutcome {
        let mut outcome = InstanceOutcome::default();
        let mut batch = Vec::new();

        for producer in &self.producers {
            match collect_isolated(producer.as_ref(), cache, instance) {
                Some(samples) => batch.extend(samples.filter(|s| self.filter.accepts(s.name()))),
                None => outcome.failures += 1,
            }
        }

        outcome.samples = batch.len();
        debug!("Collected {} samples for instance {}", batch.len(), instance.id);

        if !batch.is_empty() {
            if let Err(e) = publisher.publish(batch) {
                error!("Failed to publish samples for instance {}: {:#}", instance.id, e);
                outcome.publish_failed = true;
            }
        }
        outcome
    }
}

/// Runs `producer` for `instance`, logging and swallowing any failure.
pub fn collect_isolated(
    producer: &dyn Producer,
    cache: &CycleCache,
    instance: &Instance,
) -> Option<Samples> {
    match producer.collect(cache, instance) {
        Ok(samples) => Some(samples),
        Err(e) => {
            warn!(
                producer = producer.name(),
                instance_id = %instance.id,
                kind = e.kind(),
                "Producer failed for instance: {}",
                e
            );
            None
        }
    }
}
