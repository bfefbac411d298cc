//! Metric producers.
//!
//! A producer is the unit of collection: it declares the sample names it
//! can emit and, given the cycle cache and one instance, yields a finite
//! single-pass sequence of samples. The registry is a fixed list built by
//! [`default_producers`].

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::cache::CycleCache;
use crate::error::CollectError;
use crate::inspector::Inspector;
use crate::instance::{instance_metadata, Instance, MetadataPolicy};
use crate::sample::{Identity, Metadata, Sample, SampleKind, Volume};
use crate::tracker::UtilizationTracker;

pub mod cpu;
pub mod diskio;
pub mod network;
pub mod presence;

pub use cpu::CpuProducer;
pub use diskio::{DiskIoNamespace, DiskIoProducer, DiskIoTotals};
pub use network::NetworkProducer;
pub use presence::InstancePresenceProducer;

/// Lazily produced samples for one instance; consumed exactly once.
pub type Samples = Box<dyn Iterator<Item = Sample> + Send>;

pub trait Producer: Send + Sync {
    /// Short name used in logs and statistics.
    fn name(&self) -> &'static str;

    /// Sample names this producer may emit; `*` marks a variable suffix.
    fn sample_names(&self) -> &'static [&'static str];

    fn collect(&self, cache: &CycleCache, instance: &Instance) -> Result<Samples, CollectError>;
}

/// Collaborators shared by every producer.
#[derive(Clone)]
pub struct ProducerContext {
    pub inspector: Arc<dyn Inspector>,
    pub metadata_policy: Arc<MetadataPolicy>,
}

impl ProducerContext {
    pub fn new(inspector: Arc<dyn Inspector>, metadata_policy: MetadataPolicy) -> Self {
        Self {
            inspector,
            metadata_policy: Arc::new(metadata_policy),
        }
    }
}

/// Presence, disk I/O, CPU and network, in that order.
pub fn default_producers(
    ctx: &ProducerContext,
    tracker: Arc<UtilizationTracker>,
) -> Vec<Box<dyn Producer>> {
    vec![
        Box::new(InstancePresenceProducer::new(ctx.clone())),
        Box::new(DiskIoProducer::new(ctx.clone())),
        Box::new(CpuProducer::new(ctx.clone(), tracker)),
        Box::new(NetworkProducer::new(ctx.clone())),
    ]
}

/// Static description of one emitted meter.
pub(crate) struct Meter<T> {
    pub name: &'static str,
    pub kind: SampleKind,
    pub unit: &'static str,
    pub value: fn(&T) -> i64,
}

/// Identity, metadata and timestamp shared by the samples of one batch.
#[derive(Clone)]
pub(crate) struct SampleTemplate {
    identity: Identity,
    metadata: Metadata,
    timestamp: DateTime<Utc>,
}

impl SampleTemplate {
    pub fn new(identity: Identity, metadata: Metadata, timestamp: DateTime<Utc>) -> Self {
        Self {
            identity,
            metadata,
            timestamp,
        }
    }

    /// Template for samples whose resource is the instance itself.
    pub fn for_instance(instance: &Instance, policy: &MetadataPolicy) -> Self {
        Self::new(
            Identity {
                user_id: instance.user_id.clone(),
                project_id: instance.project_id.clone(),
                resource_id: instance.id.clone(),
            },
            instance_metadata(instance, policy),
            Utc::now(),
        )
    }

    pub fn build(
        &self,
        name: impl Into<String>,
        kind: SampleKind,
        unit: &str,
        volume: impl Into<Volume>,
    ) -> Sample {
        Sample::new(
            name,
            kind,
            unit,
            volume,
            self.identity.clone(),
            self.timestamp,
            self.metadata.clone(),
        )
    }

    pub fn build_meter<T>(&self, meter: &Meter<T>, data: &T) -> Sample {
        self.build(meter.name, meter.kind, meter.unit, (meter.value)(data))
    }
}
