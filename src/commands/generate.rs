//! Generate testdata command implementation.
//!
//! Writes a synthetic inventory with randomized counters that the meter can
//! run against in place of a hypervisor.

use chrono::Utc;
use herakles_compute_meter::inspector::inventory::{InventoryDisk, InventoryVnic};
use herakles_compute_meter::inspector::{
    CpuStats, Disk, DiskStats, Interface, InterfaceStats, Inventory, InventoryEntry,
};
use herakles_compute_meter::instance::{Flavor, Image, ImageLink, Instance};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::json;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

static FLAVORS: Lazy<Vec<Flavor>> = Lazy::new(|| {
    [
        ("1", "m1.tiny", 1, 512, 1),
        ("2", "m1.small", 1, 2048, 20),
        ("3", "m1.medium", 2, 4096, 40),
        ("4", "m1.large", 4, 8192, 80),
        ("5", "m1.xlarge", 8, 16384, 160),
    ]
    .into_iter()
    .map(|(id, name, vcpus, ram, disk)| Flavor {
        id: id.to_string(),
        name: name.to_string(),
        vcpus: Some(vcpus),
        ram: Some(ram),
        disk: Some(disk),
    })
    .collect()
});

const STACKS: &[&str] = &["blue", "green", "batch"];

/// Generates a synthetic inventory JSON file for testing purposes.
pub fn command_generate_testdata(output: PathBuf, instances: usize, failing: usize) -> anyhow::Result<()> {
    let inventory = generate_inventory(&mut rand::thread_rng(), instances, failing);
    write_inventory(&output, &inventory)?;

    println!(
        "✅ Generated inventory: {} instances ({} failing) in {}",
        inventory.instances.len(),
        failing.min(instances),
        output.display()
    );
    Ok(())
}

pub fn write_inventory(path: &Path, inventory: &Inventory) -> anyhow::Result<()> {
    let json_content = serde_json::to_string_pretty(inventory)?;
    fs::write(path, json_content)?;
    Ok(())
}

/// Builds `count` instances; the first `failing` are flagged to fail.
pub fn generate_inventory(rng: &mut impl Rng, count: usize, failing: usize) -> Inventory {
    debug!("Generating inventory: instances={}, failing={}", count, failing);

    let instances = (0..count)
        .map(|i| {
            let mut entry = generate_entry(rng, i);
            entry.fail = i < failing;
            entry
        })
        .collect();

    Inventory {
        version: "1.0".to_string(),
        generated_at: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        instances,
    }
}

fn generate_entry(rng: &mut impl Rng, index: usize) -> InventoryEntry {
    let flavor = FLAVORS
        .choose(rng)
        .cloned()
        .unwrap_or_default();
    let vcpus = flavor.vcpus.unwrap_or(1);
    let id = format!(
        "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
        rng.gen::<u32>(),
        rng.gen::<u16>(),
        rng.gen::<u16>(),
        rng.gen::<u16>(),
        rng.gen::<u64>() & 0xffff_ffff_ffff
    );
    let instance_name = format!("instance-{:08x}", index + 1);
    let image_id = format!("img-{:04x}", rng.gen::<u16>());

    let properties = BTreeMap::from([
        ("architecture".to_string(), json!("x86_64")),
        ("os_type".to_string(), json!("linux")),
        ("vcpus".to_string(), json!(vcpus)),
        ("memory_mb".to_string(), json!(flavor.ram)),
        ("root_gb".to_string(), json!(flavor.disk)),
        ("ephemeral_gb".to_string(), json!(0)),
    ]);
    let stack = STACKS.choose(rng).copied().unwrap_or("blue");
    let metadata = BTreeMap::from([
        ("metering.stack".to_string(), json!(stack)),
        ("owner".to_string(), json!("ops")),
    ]);

    let disk_count = rng.gen_range(1..=3);
    let disks = (0..disk_count)
        .map(|d| InventoryDisk {
            disk: Disk {
                device: format!("vd{}", (b'a' + d as u8) as char),
            },
            stats: DiskStats {
                read_bytes: rng.gen_range(1_000_000..10_000_000_000),
                read_requests: rng.gen_range(100..1_000_000),
                write_bytes: rng.gen_range(1_000_000..10_000_000_000),
                write_requests: rng.gen_range(100..1_000_000),
                errors: 0,
            },
        })
        .collect();

    let vnic_count = rng.gen_range(1..=2);
    let vnics = (0..vnic_count)
        .map(|n| {
            let mac = format!("fa:16:3e:{:02x}:{:02x}:{:02x}", rng.gen::<u8>(), rng.gen::<u8>(), n);
            // Half of the vNICs carry a stable reference.
            let fref = rng
                .gen_bool(0.5)
                .then(|| format!("nova-{}-{}", instance_name, mac.replace(':', "")));
            InventoryVnic {
                interface: Interface {
                    name: format!("tap{}", n),
                    mac: Some(mac),
                    fref,
                    parameters: BTreeMap::from([(
                        "ip".to_string(),
                        format!("10.0.{}.{}", index % 250, 10 + n),
                    )]),
                },
                stats: InterfaceStats {
                    rx_bytes: rng.gen_range(1_000..1_000_000_000),
                    rx_packets: rng.gen_range(10..1_000_000),
                    tx_bytes: rng.gen_range(1_000..1_000_000_000),
                    tx_packets: rng.gen_range(10..1_000_000),
                },
            }
        })
        .collect();

    InventoryEntry {
        instance: Instance {
            id: id.clone(),
            instance_name: Some(instance_name),
            display_name: format!("vm-{}", index + 1),
            user_id: format!("user-{}", rng.gen_range(1..=3)),
            project_id: format!("project-{}", rng.gen_range(1..=2)),
            host: "compute-1".to_string(),
            image: Some(Image {
                id: image_id.clone(),
                links: vec![ImageLink {
                    href: format!("http://images.local/images/{image_id}"),
                }],
            }),
            flavor: Some(flavor),
            availability_zone: Some("nova".to_string()),
            properties,
            metadata,
        },
        cpu: Some(CpuStats {
            // CPU time: 0 - 10000 seconds in ns
            time: rng.gen_range(0..10_000_000_000_000),
            number: vcpus,
        }),
        disks,
        vnics,
        fail: false,
    }
}
