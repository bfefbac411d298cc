//! Compute-instance metering core.
//!
//! Every polling cycle the [`Collector`] visits the instances running on this
//! host with a fixed set of producers (instance presence, disk I/O, CPU and
//! network), turning raw hypervisor counters into typed [`Sample`]s that are
//! handed to a [`Publisher`].

pub mod cache;
pub mod collector;
pub mod config;
pub mod error;
pub mod filter;
pub mod health_stats;
pub mod inspector;
pub mod instance;
pub mod producers;
pub mod publisher;
pub mod sample;
pub mod tracker;

#[cfg(test)]
mod testing;

pub use cache::{CacheHandle, CacheNamespace, CycleCache};
pub use collector::{collect_isolated, Collector, CycleReport};
pub use config::{load_config, validate_effective_config, Config};
pub use error::{CollectError, InspectorError};
pub use filter::MeterFilter;
pub use health_stats::HealthStats;
pub use inspector::{FileInventory, Inspector, InstanceSource};
pub use instance::{Instance, MetadataPolicy};
pub use producers::{Producer, ProducerContext, Samples};
pub use publisher::{FanoutPublisher, FilePublisher, Publisher, SnapshotPublisher};
pub use sample::{Identity, Metadata, Sample, SampleKind, Volume};
pub use tracker::UtilizationTracker;
