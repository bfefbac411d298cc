//! Hypervisor inspector boundary.
//!
//! The metering core never talks to a hypervisor directly. It consumes the
//! [`Inspector`] capability for raw per-instance counters and an
//! [`InstanceSource`] for the set of instances to visit each cycle. Per-call
//! timeouts are the implementation's responsibility.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::InspectorError;
use crate::instance::Instance;

pub mod inventory;

pub use inventory::{FileInventory, Inventory, InventoryEntry};

/// Cumulative CPU facts for one instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuStats {
    /// CPU time consumed since the instance started, in nanoseconds.
    pub time: i64,
    /// Number of virtual cores.
    pub number: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Disk {
    pub device: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiskStats {
    pub read_bytes: i64,
    pub read_requests: i64,
    pub write_bytes: i64,
    pub write_requests: i64,
    #[serde(default)]
    pub errors: i64,
}

/// A virtual NIC attached to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interface {
    pub name: String,
    #[serde(default)]
    pub mac: Option<String>,
    /// Stable external reference (e.g. a port filter ref), preferred as
    /// resource id over the synthesized name.
    #[serde(default)]
    pub fref: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceStats {
    pub rx_bytes: i64,
    pub rx_packets: i64,
    pub tx_bytes: i64,
    pub tx_packets: i64,
}

/// Raw counter access for instances on this host.
pub trait Inspector: Send + Sync {
    fn inspect_cpu(&self, instance_name: &str) -> Result<CpuStats, InspectorError>;

    fn inspect_disks(&self, instance_name: &str) -> Result<Vec<(Disk, DiskStats)>, InspectorError>;

    fn inspect_vnics(
        &self,
        instance_name: &str,
    ) -> Result<Vec<(Interface, InterfaceStats)>, InspectorError>;
}

/// Discovery of the instances to meter in the next cycle.
pub trait InstanceSource: Send + Sync {
    fn instances(&self) -> anyhow::Result<Vec<Instance>>;
}
