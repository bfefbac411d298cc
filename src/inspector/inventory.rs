//! File-backed inventory acting as both instance source and inspector.
//!
//! The inventory is a JSON document listing instances together with their
//! raw counters. It is re-read at the start of every cycle so an external
//! process can keep the counters moving. Entries flagged with `fail` make
//! every inspector call for that instance fail.

use ahash::AHashMap as HashMap;
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};
use tracing::{debug, info};

use super::{CpuStats, Disk, DiskStats, Inspector, InstanceSource, Interface, InterfaceStats};
use crate::error::InspectorError;
use crate::instance::Instance;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryDisk {
    #[serde(flatten)]
    pub disk: Disk,
    #[serde(flatten)]
    pub stats: DiskStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryVnic {
    #[serde(flatten)]
    pub interface: Interface,
    #[serde(flatten)]
    pub stats: InterfaceStats,
}

/// One instance with the raw counters the inspector reports for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub instance: Instance,
    #[serde(default)]
    pub cpu: Option<CpuStats>,
    #[serde(default)]
    pub disks: Vec<InventoryDisk>,
    #[serde(default)]
    pub vnics: Vec<InventoryVnic>,
    #[serde(default)]
    pub fail: bool,
}

/// Root structure of the inventory JSON file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Inventory {
    pub version: String,
    pub generated_at: String,
    pub instances: Vec<InventoryEntry>,
}

impl Inventory {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        debug!("Loading inventory from: {}", path.display());
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read inventory file {}", path.display()))?;
        let inventory: Inventory = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse inventory JSON {}", path.display()))?;
        Ok(inventory)
    }
}

/// Inventory file exposed through [`InstanceSource`] and [`Inspector`].
pub struct FileInventory {
    path: PathBuf,
    entries: RwLock<HashMap<String, InventoryEntry>>,
}

impl FileInventory {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-reads the file and returns the instances it lists.
    pub fn reload(&self) -> anyhow::Result<Vec<Instance>> {
        let inventory = Inventory::load(&self.path)?;
        let instances: Vec<Instance> = inventory
            .instances
            .iter()
            .map(|e| e.instance.clone())
            .collect();

        // Entries without a hypervisor name are still metered (and rejected
        // per producer), but the inspector cannot address them.
        let indexed: HashMap<String, InventoryEntry> = inventory
            .instances
            .into_iter()
            .filter_map(|e| e.instance.instance_name.clone().map(|name| (name, e)))
            .collect();

        info!(
            "Loaded inventory version {} ({}) with {} instances from {}",
            inventory.version,
            inventory.generated_at,
            instances.len(),
            self.path.display()
        );

        *self.entries.write().unwrap_or_else(PoisonError::into_inner) = indexed;
        Ok(instances)
    }

    fn with_entry<T>(
        &self,
        instance_name: &str,
        f: impl FnOnce(&InventoryEntry) -> Result<T, InspectorError>,
    ) -> Result<T, InspectorError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        let entry = entries
            .get(instance_name)
            .ok_or_else(|| InspectorError::InstanceNotFound {
                instance_name: instance_name.to_string(),
            })?;
        if entry.fail {
            return Err(InspectorError::inspection(
                instance_name,
                "inventory entry marked as failing",
            ));
        }
        f(entry)
    }
}

impl InstanceSource for FileInventory {
    fn instances(&self) -> anyhow::Result<Vec<Instance>> {
        self.reload()
    }
}

impl Inspector for FileInventory {
    fn inspect_cpu(&self, instance_name: &str) -> Result<CpuStats, InspectorError> {
        self.with_entry(instance_name, |e| {
            e.cpu
                .ok_or_else(|| InspectorError::inspection(instance_name, "no CPU statistics"))
        })
    }

    fn inspect_disks(&self, instance_name: &str) -> Result<Vec<(Disk, DiskStats)>, InspectorError> {
        self.with_entry(instance_name, |e| {
            Ok(e.disks.iter().map(|d| (d.disk.clone(), d.stats)).collect())
        })
    }

    fn inspect_vnics(
        &self,
        instance_name: &str,
    ) -> Result<Vec<(Interface, InterfaceStats)>, InspectorError> {
        self.with_entry(instance_name, |e| {
            Ok(e.vnics
                .iter()
                .map(|v| (v.interface.clone(), v.stats))
                .collect())
        })
    }
}
