//! Test doubles shared by the unit tests.

use ahash::AHashSet as HashSet;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::InspectorError;
use crate::inspector::{CpuStats, Disk, DiskStats, Inspector, Interface, InterfaceStats};
use crate::instance::{Flavor, Instance, MetadataPolicy};
use crate::producers::ProducerContext;

#[derive(Default)]
struct FakeState {
    cpu_calls: AtomicUsize,
    disk_calls: AtomicUsize,
    vnic_calls: AtomicUsize,
    cpu_offset: AtomicI64,
    failing: Mutex<HashSet<String>>,
}

/// Call-counting inspector with two disks and two vNICs per instance.
#[derive(Clone, Default)]
pub struct FakeInspector {
    state: Arc<FakeState>,
}

impl FakeInspector {
    pub const CPU_TIME: i64 = 1_000_000;

    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every call for `instance_name` fail.
    pub fn failing(self, instance_name: &str) -> Self {
        self.state
            .failing
            .lock()
            .unwrap()
            .insert(instance_name.to_string());
        self
    }

    pub fn context(&self) -> ProducerContext {
        ProducerContext::new(Arc::new(self.clone()), MetadataPolicy::default())
    }

    pub fn advance_cpu(&self, ns: i64) {
        self.state.cpu_offset.fetch_add(ns, Ordering::SeqCst);
    }

    pub fn cpu_calls(&self) -> usize {
        self.state.cpu_calls.load(Ordering::SeqCst)
    }

    pub fn disk_calls(&self) -> usize {
        self.state.disk_calls.load(Ordering::SeqCst)
    }

    pub fn vnic_calls(&self) -> usize {
        self.state.vnic_calls.load(Ordering::SeqCst)
    }

    fn check(&self, instance_name: &str) -> Result<(), InspectorError> {
        if self.state.failing.lock().unwrap().contains(instance_name) {
            return Err(InspectorError::inspection(instance_name, "injected failure"));
        }
        Ok(())
    }
}

impl Inspector for FakeInspector {
    fn inspect_cpu(&self, instance_name: &str) -> Result<CpuStats, InspectorError> {
        self.state.cpu_calls.fetch_add(1, Ordering::SeqCst);
        self.check(instance_name)?;
        Ok(CpuStats {
            time: Self::CPU_TIME + self.state.cpu_offset.load(Ordering::SeqCst),
            number: 2,
        })
    }

    fn inspect_disks(&self, instance_name: &str) -> Result<Vec<(Disk, DiskStats)>, InspectorError> {
        self.state.disk_calls.fetch_add(1, Ordering::SeqCst);
        self.check(instance_name)?;
        Ok(vec![
            (
                Disk { device: "vda".into() },
                DiskStats {
                    read_bytes: 1000,
                    read_requests: 10,
                    write_bytes: 3000,
                    write_requests: 30,
                    errors: 0,
                },
            ),
            (
                Disk { device: "vdb".into() },
                DiskStats {
                    read_bytes: 2000,
                    read_requests: 20,
                    write_bytes: 4000,
                    write_requests: 40,
                    errors: 1,
                },
            ),
        ])
    }

    fn inspect_vnics(
        &self,
        instance_name: &str,
    ) -> Result<Vec<(Interface, InterfaceStats)>, InspectorError> {
        self.state.vnic_calls.fetch_add(1, Ordering::SeqCst);
        self.check(instance_name)?;
        Ok(vec![
            (
                Interface {
                    name: "tap0".into(),
                    mac: Some("fa:16:3e:00:00:01".into()),
                    fref: None,
                    parameters: BTreeMap::from([("ip".into(), "10.0.0.2".into())]),
                },
                InterfaceStats {
                    rx_bytes: 100,
                    rx_packets: 1,
                    tx_bytes: 200,
                    tx_packets: 2,
                },
            ),
            (
                Interface {
                    name: "tap1".into(),
                    mac: Some("fa:16:3e:00:00:02".into()),
                    fref: Some(format!("nova-{}-fa163e000002", instance_name)),
                    parameters: BTreeMap::new(),
                },
                InterfaceStats {
                    rx_bytes: 300,
                    rx_packets: 3,
                    tx_bytes: 400,
                    tx_packets: 4,
                },
            ),
        ])
    }
}

/// Instance `id` named `instance-<id>` on the hypervisor.
pub fn instance(id: &str, flavor: &str) -> Instance {
    Instance {
        id: id.to_string(),
        instance_name: Some(format!("instance-{id}")),
        display_name: format!("vm-{id}"),
        user_id: "user-1".into(),
        project_id: "project-1".into(),
        host: "compute-1".into(),
        flavor: Some(Flavor {
            id: format!("flavor-{flavor}"),
            name: flavor.to_string(),
            ..Default::default()
        }),
        metadata: BTreeMap::from([("metering.stack".into(), json!("blue"))]),
        ..Default::default()
    }
}
