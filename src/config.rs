//! Configuration file handling.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::filter::MeterFilter;
use crate::instance::{MetadataPolicy, DEFAULT_RESERVED_LENGTH, DEFAULT_RESERVED_NAMESPACE};
use crate::tracker::DEFAULT_RETENTION_CYCLES;

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9216;
pub const DEFAULT_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_INVENTORY_FILE: &str = "/var/lib/herakles/compute-inventory.json";

/// Locations probed when no config path is given.
pub const DEFAULT_CONFIG_PATHS: &[&str] = &[
    "/etc/herakles/compute-meter.yaml",
    "/etc/herakles/compute-meter.yml",
    "/etc/herakles/compute-meter.json",
    "./herakles-compute-meter.yaml",
    "./herakles-compute-meter.yml",
    "./herakles-compute-meter.json",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    // Server configuration
    pub port: Option<u16>,
    pub bind: Option<String>,

    // Polling
    #[serde(alias = "interval")]
    pub interval_secs: Option<u64>,
    pub parallelism: Option<usize>,
    /// Sample name patterns; `!` negates.
    pub meters: Option<Vec<String>>,
    #[serde(alias = "tracker-retention-cycles")]
    pub tracker_retention_cycles: Option<u64>,

    // Resource metadata
    #[serde(alias = "reserved-metadata-namespace")]
    pub reserved_metadata_namespace: Option<Vec<String>>,
    #[serde(alias = "reserved-metadata-length")]
    pub reserved_metadata_length: Option<usize>,

    // Feature flags
    pub enable_health: Option<bool>,

    // Logging
    pub log_level: Option<String>,

    // Inputs and outputs
    pub publish_file: Option<PathBuf>,
    pub inventory_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: Some(DEFAULT_PORT),
            bind: Some(DEFAULT_BIND_ADDR.to_string()),
            interval_secs: Some(DEFAULT_INTERVAL_SECS),
            parallelism: None,
            meters: Some(vec!["*".into()]),
            tracker_retention_cycles: Some(DEFAULT_RETENTION_CYCLES),
            reserved_metadata_namespace: Some(vec![DEFAULT_RESERVED_NAMESPACE.into()]),
            reserved_metadata_length: Some(DEFAULT_RESERVED_LENGTH),
            enable_health: Some(true),
            log_level: Some("info".into()),
            publish_file: None,
            inventory_file: Some(PathBuf::from(DEFAULT_INVENTORY_FILE)),
        }
    }
}

impl Config {
    pub fn interval_secs(&self) -> u64 {
        self.interval_secs.unwrap_or(DEFAULT_INTERVAL_SECS)
    }

    pub fn retention_cycles(&self) -> u64 {
        self.tracker_retention_cycles
            .unwrap_or(DEFAULT_RETENTION_CYCLES)
    }

    /// Worker count; 1 means sequential collection.
    pub fn parallelism(&self) -> usize {
        self.parallelism.unwrap_or(1).max(1)
    }

    pub fn inventory_file(&self) -> PathBuf {
        self.inventory_file
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_INVENTORY_FILE))
    }

    pub fn meter_filter(&self) -> MeterFilter {
        match &self.meters {
            Some(patterns) => MeterFilter::new(patterns.as_slice()),
            None => MeterFilter::all(),
        }
    }

    pub fn metadata_policy(&self) -> MetadataPolicy {
        let defaults = MetadataPolicy::default();
        MetadataPolicy {
            reserved_namespaces: self
                .reserved_metadata_namespace
                .clone()
                .unwrap_or(defaults.reserved_namespaces),
            reserved_length: self
                .reserved_metadata_length
                .unwrap_or(defaults.reserved_length),
        }
    }
}

/// Validate effective config (used by `check` and at startup)
pub fn validate_effective_config(cfg: &Config) -> anyhow::Result<()> {
    if cfg.interval_secs == Some(0) {
        bail!("interval_secs must be greater than zero");
    }

    if cfg.tracker_retention_cycles == Some(0) {
        bail!("tracker_retention_cycles must be greater than zero");
    }

    if let Some(meters) = &cfg.meters {
        if meters.is_empty() {
            bail!("meters must contain at least one pattern (use '*' for all)");
        }
        if let Some(bad) = meters.iter().find(|m| m.trim().is_empty() || m.trim() == "!") {
            bail!("Invalid meter pattern '{}'", bad);
        }
    }

    if let Some(namespaces) = &cfg.reserved_metadata_namespace {
        if namespaces.iter().any(|n| n.is_empty()) {
            bail!("reserved_metadata_namespace entries must not be empty");
        }
    }

    Ok(())
}

/// Loads a config file, probing [`DEFAULT_CONFIG_PATHS`] when `path` is
/// `None`. Falls back to defaults when nothing is found.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => match DEFAULT_CONFIG_PATHS.iter().find(|p| Path::new(p).exists()) {
            Some(found) => PathBuf::from(found),
            None => return Ok(Config::default()),
        },
    };

    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config = parse_config(&path, &content)?;
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}

/// Parses `content` in the format implied by the extension of `path`.
pub fn parse_config(path: &Path, content: &str) -> anyhow::Result<Config> {
    let config = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(content)
            .with_context(|| format!("Invalid JSON config {}", path.display()))?,
        Some("toml") => toml::from_str(content)
            .with_context(|| format!("Invalid TOML config {}", path.display()))?,
        // Default to YAML
        _ => serde_yaml::from_str(content)
            .with_context(|| format!("Invalid YAML config {}", path.display()))?,
    };
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = Config::default();
        validate_effective_config(&cfg).unwrap();
        assert_eq!(cfg.interval_secs(), 60);
        assert_eq!(cfg.retention_cycles(), 3);
        assert_eq!(cfg.parallelism(), 1);
        assert_eq!(cfg.metadata_policy(), MetadataPolicy::default());
    }

    #[test]
    fn test_validation_rejects() {
        let cases = [
            Config {
                interval_secs: Some(0),
                ..Default::default()
            },
            Config {
                tracker_retention_cycles: Some(0),
                ..Default::default()
            },
            Config {
                meters: Some(vec![]),
                ..Default::default()
            },
            Config {
                meters: Some(vec!["!".into()]),
                ..Default::default()
            },
            Config {
                reserved_metadata_namespace: Some(vec![String::new()]),
                ..Default::default()
            },
        ];
        for cfg in &cases {
            assert!(validate_effective_config(cfg).is_err(), "{cfg:?}");
        }
    }

    #[test]
    fn test_yaml_partial_config() {
        let yaml = "port: 9300\nmeters:\n  - cpu*\n  - '!cpu_util'\nreserved-metadata-length: 16\n";
        let cfg = parse_config(Path::new("meter.yaml"), yaml).unwrap();
        assert_eq!(cfg.port, Some(9300));
        assert_eq!(cfg.interval_secs, None);
        assert_eq!(cfg.interval_secs(), DEFAULT_INTERVAL_SECS);
        assert_eq!(cfg.metadata_policy().reserved_length, 16);

        let filter = cfg.meter_filter();
        assert!(filter.accepts("cpu"));
        assert!(!filter.accepts("cpu_util"));
        assert!(!filter.accepts("instance"));
    }

    #[test]
    fn test_format_by_extension() {
        let json = parse_config(Path::new("m.json"), r#"{"interval_secs": 5}"#).unwrap();
        assert_eq!(json.interval_secs(), 5);

        let toml = parse_config(Path::new("m.toml"), "parallelism = 4\n").unwrap();
        assert_eq!(toml.parallelism(), 4);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meter.yaml");
        fs::write(&path, "interval_secs: 10\n").unwrap();

        let cfg = load_config(Some(&path)).unwrap();
        assert_eq!(cfg.interval_secs(), 10);
        assert!(load_config(Some(&dir.path().join("missing.yaml"))).is_err());
    }
}
