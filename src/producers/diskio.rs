//! Disk I/O counters summed over all block devices of an instance.

use tracing::debug;

use super::{Meter, Producer, ProducerContext, SampleTemplate, Samples};
use crate::cache::{CacheNamespace, CycleCache};
use crate::error::CollectError;
use crate::instance::Instance;
use crate::sample::SampleKind;

/// Per-instance totals across all block devices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiskIoTotals {
    pub read_bytes: i64,
    pub read_requests: i64,
    pub write_bytes: i64,
    pub write_requests: i64,
}

/// Cycle cache namespace holding [`DiskIoTotals`].
pub struct DiskIoNamespace;

impl CacheNamespace for DiskIoNamespace {
    const NAME: &'static str = "diskio";
    type Value = DiskIoTotals;
}

static DISK_METERS: [Meter<DiskIoTotals>; 4] = [
    Meter {
        name: "disk.read.requests",
        kind: SampleKind::Cumulative,
        unit: "request",
        value: |t| t.read_requests,
    },
    Meter {
        name: "disk.read.bytes",
        kind: SampleKind::Cumulative,
        unit: "B",
        value: |t| t.read_bytes,
    },
    Meter {
        name: "disk.write.requests",
        kind: SampleKind::Cumulative,
        unit: "request",
        value: |t| t.write_requests,
    },
    Meter {
        name: "disk.write.bytes",
        kind: SampleKind::Cumulative,
        unit: "B",
        value: |t| t.write_bytes,
    },
];

pub struct DiskIoProducer {
    ctx: ProducerContext,
}

impl DiskIoProducer {
    pub fn new(ctx: ProducerContext) -> Self {
        Self { ctx }
    }

    fn inspect_totals(&self, instance_name: &str) -> Result<DiskIoTotals, CollectError> {
        let mut totals = DiskIoTotals::default();
        for (disk, info) in self.ctx.inspector.inspect_disks(instance_name)? {
            debug!(
                "DISKIO USAGE: {} {}: read-requests={} read-bytes={} write-requests={} write-bytes={} errors={}",
                instance_name,
                disk.device,
                info.read_requests,
                info.read_bytes,
                info.write_requests,
                info.write_bytes,
                info.errors
            );
            totals.read_bytes = totals.read_bytes.saturating_add(info.read_bytes);
            totals.read_requests = totals.read_requests.saturating_add(info.read_requests);
            totals.write_bytes = totals.write_bytes.saturating_add(info.write_bytes);
            totals.write_requests = totals.write_requests.saturating_add(info.write_requests);
        }
        Ok(totals)
    }
}

impl Producer for DiskIoProducer {
    fn name(&self) -> &'static str {
        "diskio"
    }

    fn sample_names(&self) -> &'static [&'static str] {
        &[
            "disk.read.requests",
            "disk.read.bytes",
            "disk.write.requests",
            "disk.write.bytes",
        ]
    }

    fn collect(&self, cache: &CycleCache, instance: &Instance) -> Result<Samples, CollectError> {
        let instance_name = instance.hypervisor_name()?;
        let totals = cache
            .handle::<DiskIoNamespace>()
            .get_or_compute(instance_name, || self.inspect_totals(instance_name))?;

        let template = SampleTemplate::for_instance(instance, &self.ctx.metadata_policy);
        Ok(Box::new(
            DISK_METERS
                .iter()
                .map(move |meter| template.build_meter(meter, &totals)),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{instance, FakeInspector};

    #[test]
    fn test_disk_totals_summed_over_devices() {
        let inspector = FakeInspector::new();
        let producer = DiskIoProducer::new(inspector.context());
        let samples: Vec<_> = producer
            .collect(&CycleCache::new(), &instance("i-1", "m1.small"))
            .unwrap()
            .collect();

        let by_name = |n: &str| {
            samples
                .iter()
                .find(|s| s.name() == n)
                .map(|s| s.volume().as_f64())
                .unwrap()
        };

        // FakeInspector reports two devices per instance.
        assert_eq!(samples.len(), 4);
        assert_eq!(by_name("disk.read.bytes"), 3000.0);
        assert_eq!(by_name("disk.read.requests"), 30.0);
        assert_eq!(by_name("disk.write.bytes"), 7000.0);
        assert_eq!(by_name("disk.write.requests"), 70.0);
        assert!(samples.iter().all(|s| s.kind() == SampleKind::Cumulative));
    }

    #[test]
    fn test_disk_inspected_once_per_cycle() {
        let inspector = FakeInspector::new();
        let first = DiskIoProducer::new(inspector.context());
        let second = DiskIoProducer::new(inspector.context());
        let cache = CycleCache::new();
        let inst = instance("i-1", "m1.small");

        let a: Vec<_> = first.collect(&cache, &inst).unwrap().collect();
        let b: Vec<_> = second.collect(&cache, &inst).unwrap().collect();

        assert_eq!(a.len(), 4);
        assert_eq!(b.len(), 4);
        assert_eq!(inspector.disk_calls(), 1);

        // A fresh cycle inspects again.
        first.collect(&CycleCache::new(), &inst).unwrap().for_each(drop);
        assert_eq!(inspector.disk_calls(), 2);
    }

    #[test]
    fn test_inspector_failure_is_reported() {
        let inspector = FakeInspector::new().failing("instance-i-1");
        let producer = DiskIoProducer::new(inspector.context());
        let cache = CycleCache::new();

        let err = producer
            .collect(&cache, &instance("i-1", "m1.small"))
            .err()
            .unwrap();
        assert_eq!(err.kind(), "inspection");
        assert_eq!(cache.handle::<DiskIoNamespace>().get("instance-i-1"), None);
    }
}
