//! Per-vNIC network counters.

use chrono::Utc;
use serde_json::json;
use tracing::debug;

use super::{Meter, Producer, ProducerContext, SampleTemplate, Samples};
use crate::cache::CycleCache;
use crate::error::CollectError;
use crate::inspector::{Interface, InterfaceStats};
use crate::instance::Instance;
use crate::sample::{Identity, Metadata, SampleKind};

static NET_METERS: [Meter<InterfaceStats>; 4] = [
    Meter {
        name: "network.incoming.bytes",
        kind: SampleKind::Cumulative,
        unit: "B",
        value: |s| s.rx_bytes,
    },
    Meter {
        name: "network.outgoing.bytes",
        kind: SampleKind::Cumulative,
        unit: "B",
        value: |s| s.tx_bytes,
    },
    Meter {
        name: "network.incoming.packets",
        kind: SampleKind::Cumulative,
        unit: "packet",
        value: |s| s.rx_packets,
    },
    Meter {
        name: "network.outgoing.packets",
        kind: SampleKind::Cumulative,
        unit: "packet",
        value: |s| s.tx_packets,
    },
];

pub struct NetworkProducer {
    ctx: ProducerContext,
}

impl NetworkProducer {
    pub fn new(ctx: ProducerContext) -> Self {
        Self { ctx }
    }
}

/// Resource id of a vNIC: its stable reference when the inspector has one,
/// otherwise `<instance-name>-<instance-id>-<vnic-name>`.
pub fn vnic_resource_id(instance_name: &str, instance_id: &str, vnic: &Interface) -> String {
    match &vnic.fref {
        Some(fref) if !fref.is_empty() => fref.clone(),
        _ => format!("{}-{}-{}", instance_name, instance_id, vnic.name),
    }
}

fn vnic_metadata(instance: &Instance, vnic: &Interface) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert("name".into(), json!(vnic.name));
    metadata.insert("mac".into(), json!(vnic.mac));
    metadata.insert("fref".into(), json!(vnic.fref));
    metadata.insert("parameters".into(), json!(vnic.parameters));
    metadata.insert("instance_id".into(), json!(instance.id));
    metadata.insert("instance_type".into(), json!(instance.flavor_id()));
    metadata
}

impl Producer for NetworkProducer {
    fn name(&self) -> &'static str {
        "network"
    }

    fn sample_names(&self) -> &'static [&'static str] {
        &[
            "network.incoming.bytes",
            "network.incoming.packets",
            "network.outgoing.bytes",
            "network.outgoing.packets",
        ]
    }

    fn collect(&self, _cache: &CycleCache, instance: &Instance) -> Result<Samples, CollectError> {
        let instance_name = instance.hypervisor_name()?;
        let vnics = self.ctx.inspector.inspect_vnics(instance_name)?;
        let timestamp = Utc::now();

        let batches: Vec<(SampleTemplate, InterfaceStats)> = vnics
            .into_iter()
            .map(|(vnic, stats)| {
                debug!(
                    "NETWORK USAGE: {} {}: read-bytes={} write-bytes={}",
                    instance_name, vnic.name, stats.rx_bytes, stats.tx_bytes
                );
                let identity = Identity {
                    user_id: instance.user_id.clone(),
                    project_id: instance.project_id.clone(),
                    resource_id: vnic_resource_id(instance_name, &instance.id, &vnic),
                };
                let template =
                    SampleTemplate::new(identity, vnic_metadata(instance, &vnic), timestamp);
                (template, stats)
            })
            .collect();

        Ok(Box::new(batches.into_iter().flat_map(|(template, stats)| {
            NET_METERS
                .iter()
                .map(move |meter| template.build_meter(meter, &stats))
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{instance, FakeInspector};
    use std::collections::BTreeSet;

    #[test]
    fn test_two_vnics_emit_eight_samples() {
        let inspector = FakeInspector::new();
        let producer = NetworkProducer::new(inspector.context());
        let samples: Vec<_> = producer
            .collect(&CycleCache::new(), &instance("i-1", "m1.small"))
            .unwrap()
            .collect();

        assert_eq!(samples.len(), 8);
        let ids: BTreeSet<_> = samples.iter().map(|s| s.resource_id().to_string()).collect();
        assert_eq!(ids.len(), 2);
        // tap0 has no fref; tap1 carries a stable reference.
        assert!(ids.contains("instance-i-1-i-1-tap0"));
        assert!(ids.contains("nova-instance-i-1-fa163e000002"));

        let names: BTreeSet<_> = samples.iter().map(|s| s.name()).collect();
        assert_eq!(names.len(), 4);
        assert!(samples.iter().all(|s| s.kind() == SampleKind::Cumulative));
    }

    #[test]
    fn test_vnic_metadata() {
        let inspector = FakeInspector::new();
        let producer = NetworkProducer::new(inspector.context());
        let sample = producer
            .collect(&CycleCache::new(), &instance("i-1", "m1.small"))
            .unwrap()
            .next()
            .unwrap();

        let md = sample.resource_metadata();
        assert_eq!(sample.name(), "network.incoming.bytes");
        assert_eq!(md["name"], "tap0");
        assert_eq!(md["instance_id"], "i-1");
        assert_eq!(md["instance_type"], "flavor-m1.small");
        assert_eq!(md["parameters"]["ip"], "10.0.0.2");
        assert!(!md.contains_key("resource_id"));
    }

    #[test]
    fn test_resource_id_fallback_on_empty_fref() {
        let vnic = Interface {
            name: "tap9".into(),
            mac: None,
            fref: Some(String::new()),
            parameters: Default::default(),
        };
        assert_eq!(
            vnic_resource_id("instance-0001", "i-9", &vnic),
            "instance-0001-i-9-tap9"
        );
    }
}
