//! Check command implementation.

use herakles_compute_meter::inspector::Inventory;
use herakles_compute_meter::{validate_effective_config, Collector, Config, FileInventory, SnapshotPublisher};
use std::sync::Arc;

/// Validates configuration and the instance inventory.
pub fn command_check(collect: bool, config: &Config) -> anyhow::Result<()> {
    println!("🔍 Herakles Compute Meter - System Check");
    println!("========================================");

    let mut all_ok = true;

    println!("\n⚙️  Checking configuration...");
    match validate_effective_config(config) {
        Ok(()) => println!("   ✅ Configuration is valid"),
        Err(e) => {
            println!("   ❌ Configuration invalid: {}", e);
            all_ok = false;
        }
    }

    let path = config.inventory_file();
    println!("\n📁 Checking inventory {}...", path.display());
    match Inventory::load(&path) {
        Ok(inventory) => {
            println!(
                "   ✅ Inventory version {} with {} instances",
                inventory.version,
                inventory.instances.len()
            );
            for entry in &inventory.instances {
                let instance = &entry.instance;
                if let Err(e) = instance.hypervisor_name() {
                    println!("   ⚠️  {}", e);
                }
                if let Err(e) = instance.flavor_name() {
                    println!("   ⚠️  {}", e);
                }
                if entry.fail {
                    println!("   ⚠️  instance {} is marked as failing", instance.id);
                }
            }
        }
        Err(e) => {
            println!("   ❌ {:#}", e);
            all_ok = false;
        }
    }

    if collect && all_ok {
        println!("\n🔄 Running one collection cycle...");
        let inventory = Arc::new(FileInventory::new(path));
        let collector = Collector::from_config(inventory.clone(), config)?;
        let publisher = SnapshotPublisher::new();
        let instances = inventory.reload()?;
        let report = collector.run_cycle(&instances, &publisher);
        println!(
            "   ✅ {} instances, {} samples, {} failures",
            report.instances, report.samples, report.failures
        );
    }

    println!("\n📋 Summary:");
    if all_ok {
        println!("   ✅ All checks passed - meter is ready");
        Ok(())
    } else {
        println!("   ❌ Some checks failed - please review warnings");
        std::process::exit(1);
    }
}
