//! Config command implementation.

use herakles_compute_meter::Config;
use std::fs;
use std::path::PathBuf;

use crate::cli::ConfigFormat;

/// Generates configuration files
pub fn command_config(
    output: Option<PathBuf>,
    format: ConfigFormat,
    commented: bool,
) -> anyhow::Result<()> {
    let config = Config::default();
    let output = output.unwrap_or_else(|| PathBuf::from("herakles-compute-meter.yaml"));

    let content = render_config(&config, format, commented)?;

    if output.to_string_lossy() == "-" {
        print!("{}", content);
    } else {
        fs::write(&output, content)?;
        println!("✅ Configuration written to: {}", output.display());
    }

    Ok(())
}

pub fn render_config(config: &Config, format: ConfigFormat, commented: bool) -> anyhow::Result<String> {
    let content = match format {
        ConfigFormat::Json => serde_json::to_string_pretty(config)?,
        ConfigFormat::Toml => toml::to_string_pretty(config)?,
        ConfigFormat::Yaml => {
            let content = serde_yaml::to_string(config)?;
            if commented {
                add_config_comments(content)
            } else {
                content
            }
        }
    };
    Ok(content)
}

/// Adds comments to YAML configuration
fn add_config_comments(yaml: String) -> String {
    let comments = r#"# Herakles Compute Meter Configuration
# ====================================
#
# Server Configuration
# --------------------
# bind: "0.0.0.0"                  # Bind IP (0.0.0.0 = all interfaces)
# port: 9216                       # HTTP port
#
# Polling
# -------
# interval_secs: 60                # Seconds between polling cycles
# parallelism: null                # Collection threads (null/1 = sequential)
# meters: ["*"]                    # Sample patterns: "*", "cpu", "disk.*", "!cpu_util"
# tracker_retention_cycles: 3      # Cycles before a vanished instance is forgotten
#
# Resource Metadata
# -----------------
# reserved_metadata_namespace: ["metering."]  # User metadata prefixes to export
# reserved_metadata_length: 256               # Max length of exported values
#
# Feature Flags
# -------------
# enable_health: true              # Enable /health endpoint
#
# Logging
# -------
# log_level: "info"                # off, error, warn, info, debug, trace
#
# Inputs and Outputs
# ------------------
# inventory_file: "/var/lib/herakles/compute-inventory.json"
# publish_file: null               # Append samples as JSON lines
"#;

    format!("{comments}\n{yaml}")
}
