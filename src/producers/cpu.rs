//! CPU time and utilization.
//!
//! Cumulative CPU time is reported as-is; utilization is derived from the
//! previous observation held by the [`UtilizationTracker`].

use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

use super::{Producer, ProducerContext, SampleTemplate, Samples};
use crate::cache::CycleCache;
use crate::error::CollectError;
use crate::instance::Instance;
use crate::sample::{Sample, SampleKind};
use crate::tracker::UtilizationTracker;

pub struct CpuProducer {
    ctx: ProducerContext,
    tracker: Arc<UtilizationTracker>,
}

impl CpuProducer {
    pub fn new(ctx: ProducerContext, tracker: Arc<UtilizationTracker>) -> Self {
        Self { ctx, tracker }
    }
}

impl Producer for CpuProducer {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn sample_names(&self) -> &'static [&'static str] {
        &["cpu", "cpu_util"]
    }

    // Each instance is visited once per cycle, so the single inspector
    // call here is not routed through the cycle cache.
    fn collect(&self, _cache: &CycleCache, instance: &Instance) -> Result<Samples, CollectError> {
        let instance_name = instance.hypervisor_name()?;
        let cpu = self.ctx.inspector.inspect_cpu(instance_name)?;
        debug!("CPUTIME USAGE: {} {}", instance.id, cpu.time);

        let cpu_util = self.tracker.observe(&instance.id, &cpu, Utc::now());
        debug!("CPU UTILIZATION %: {} {:.2}", instance.id, cpu_util);

        let template = SampleTemplate::for_instance(instance, &self.ctx.metadata_policy);
        let samples: [Sample; 2] = [
            template.build("cpu_util", SampleKind::Gauge, "%", cpu_util),
            template.build("cpu", SampleKind::Cumulative, "ns", cpu.time),
        ];
        Ok(Box::new(samples.into_iter()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sample::Volume;
    use crate::testing::{instance, FakeInspector};

    fn collect(producer: &CpuProducer, id: &str) -> Vec<Sample> {
        producer
            .collect(&CycleCache::new(), &instance(id, "m1.small"))
            .unwrap()
            .collect()
    }

    #[test]
    fn test_first_cycle_utilization_is_zero() {
        let inspector = FakeInspector::new();
        let tracker = Arc::new(UtilizationTracker::default());
        let producer = CpuProducer::new(inspector.context(), tracker.clone());

        let samples = collect(&producer, "i-1");
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].name(), "cpu_util");
        assert_eq!(samples[0].unit(), "%");
        assert_eq!(samples[0].volume(), Volume::Float(0.0));
        assert_eq!(samples[1].name(), "cpu");
        assert_eq!(samples[1].kind(), SampleKind::Cumulative);
        assert_eq!(samples[1].unit(), "ns");
        assert_eq!(samples[1].volume(), Volume::Int(FakeInspector::CPU_TIME));
        assert!(tracker.contains("i-1"));
    }

    #[test]
    fn test_second_cycle_utilization_is_bounded() {
        let inspector = FakeInspector::new();
        let tracker = Arc::new(UtilizationTracker::default());
        let producer = CpuProducer::new(inspector.context(), tracker);

        collect(&producer, "i-1");
        inspector.advance_cpu(1_000);
        let util = collect(&producer, "i-1")[0].volume().as_f64();

        assert!(util >= 0.0);
        assert!(util.is_finite());
        assert_eq!(inspector.cpu_calls(), 2);
    }

    #[test]
    fn test_failure_leaves_tracker_untouched() {
        let inspector = FakeInspector::new().failing("instance-i-2");
        let tracker = Arc::new(UtilizationTracker::default());
        let producer = CpuProducer::new(inspector.context(), tracker.clone());

        let result = producer.collect(&CycleCache::new(), &instance("i-2", "m1.small"));
        assert!(result.is_err());
        assert!(tracker.is_empty());
    }
}
