//! CLI arguments and subcommands for herakles-compute-meter.
//!
//! This module defines the command-line interface structure using the clap library,
//! including all flags, options, and subcommands.

use clap::{Parser, Subcommand, ValueEnum};
use std::net::IpAddr;
use std::path::PathBuf;

/// Log level options for CLI parsing
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Configuration format options for output
#[derive(Debug, Clone, ValueEnum)]
pub enum ConfigFormat {
    Yaml,
    Json,
    Toml,
}

/// Main CLI arguments structure
#[derive(Parser, Debug)]
#[command(
    name = "herakles-compute-meter",
    about = "Per-instance usage metering for virtualized compute hosts",
    long_about = "Per-instance usage metering for virtualized compute hosts.\n\n\
                  Polls the instances running on this host at a fixed interval and turns \
                  raw hypervisor counters (CPU time, disk I/O, vNIC traffic) into typed \
                  usage samples, served as Prometheus metrics and JSON.",
    author = "Michael Moll <proc-mem@herakles.io> - Herakles IO",
    version,
    propagate_version = true
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// HTTP listen port
    #[arg(short = 'p', long)]
    pub port: Option<u16>,

    /// Bind to specific interface/IP
    #[arg(long)]
    pub bind: Option<IpAddr>,

    /// Log level
    #[arg(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Config file (YAML/JSON/TOML)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Disable all config file loading
    #[arg(long)]
    pub no_config: bool,

    /// Print effective merged config and exit
    #[arg(long)]
    pub show_config: bool,

    /// Output format for --show-config
    #[arg(long, value_enum, default_value = "yaml")]
    pub config_format: ConfigFormat,

    /// Validate config and exit (return code 1 on error)
    #[arg(long)]
    pub check_config: bool,

    /// Seconds between polling cycles
    #[arg(long)]
    pub interval: Option<u64>,

    /// Parallel collection threads (1 = sequential)
    #[arg(long)]
    pub parallelism: Option<usize>,

    /// Sample name patterns to collect (comma-separated, `!` negates)
    #[arg(long)]
    pub meters: Option<String>,

    /// Inventory JSON listing instances and their counters
    #[arg(short = 'i', long)]
    pub inventory: Option<PathBuf>,

    /// Append every sample as a JSON line to this file
    #[arg(long)]
    pub publish_file: Option<PathBuf>,

    /// Disable /health endpoint
    #[arg(long)]
    pub disable_health: bool,
}

/// Subcommands for additional functionality
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Validate configuration and inventory
    Check {
        /// Also run one collection cycle against the inventory
        #[arg(long)]
        collect: bool,
    },

    /// Generate configuration files
    Config {
        /// Output file path ("-" for stdout)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,

        /// Output format
        #[arg(long, value_enum, default_value = "yaml")]
        format: ConfigFormat,

        /// Include comments and examples
        #[arg(long)]
        commented: bool,
    },

    /// Run collection cycles against the inventory and print the samples
    Test {
        /// Number of cycles
        #[arg(short = 'n', long, default_value_t = 1)]
        iterations: usize,

        /// Print every sample instead of a per-meter summary
        #[arg(long)]
        verbose: bool,

        /// Pause between cycles in seconds
        #[arg(long, default_value_t = 1)]
        pause: u64,
    },

    /// Generate a synthetic inventory JSON file
    GenerateTestdata {
        /// Output file path
        #[arg(short = 'o', long, default_value = "inventory.json")]
        output: PathBuf,

        /// Number of instances to generate
        #[arg(long, default_value_t = 8)]
        instances: usize,

        /// Number of generated instances whose inspection fails
        #[arg(long, default_value_t = 0)]
        failing: usize,
    },
}
