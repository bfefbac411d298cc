//! Instance presence: one gauge per instance plus one per flavor.

use super::{Producer, ProducerContext, SampleTemplate, Samples};
use crate::cache::CycleCache;
use crate::error::CollectError;
use crate::instance::Instance;
use crate::sample::SampleKind;

pub struct InstancePresenceProducer {
    ctx: ProducerContext,
}

impl InstancePresenceProducer {
    pub fn new(ctx: ProducerContext) -> Self {
        Self { ctx }
    }
}

impl Producer for InstancePresenceProducer {
    fn name(&self) -> &'static str {
        "instance"
    }

    fn sample_names(&self) -> &'static [&'static str] {
        // The flavor-qualified name carries a variable suffix.
        &["instance", "instance:*"]
    }

    fn collect(&self, _cache: &CycleCache, instance: &Instance) -> Result<Samples, CollectError> {
        let flavored = format!("instance:{}", instance.flavor_name()?);
        let template = SampleTemplate::for_instance(instance, &self.ctx.metadata_policy);

        let names = [String::from("instance"), flavored];
        Ok(Box::new(names.into_iter().map(move |name| {
            template.build(name, SampleKind::Gauge, "instance", 1_i64)
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{instance, FakeInspector};

    #[test]
    fn test_presence_samples_for_flavor() {
        let producer = InstancePresenceProducer::new(FakeInspector::new().context());
        let samples: Vec<_> = producer
            .collect(&CycleCache::new(), &instance("i-1", "m1.small"))
            .unwrap()
            .collect();

        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0].name(), "instance");
        assert_eq!(samples[1].name(), "instance:m1.small");
        for s in &samples {
            assert_eq!(s.kind(), SampleKind::Gauge);
            assert_eq!(s.unit(), "instance");
            assert_eq!(s.volume().as_f64(), 1.0);
            assert_eq!(s.resource_id(), "i-1");
            assert_eq!(s.resource_metadata()["flavor"]["name"], "m1.small");
        }
    }

    #[test]
    fn test_missing_flavor_is_configuration_error() {
        let producer = InstancePresenceProducer::new(FakeInspector::new().context());
        let mut inst = instance("i-1", "m1.small");
        inst.flavor = None;

        let err = producer.collect(&CycleCache::new(), &inst).err().unwrap();
        assert_eq!(err.kind(), "configuration");
    }
}
