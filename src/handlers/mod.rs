//! HTTP endpoint handlers for the meter.
//!
//! - `/metrics`: Prometheus metrics endpoint
//! - `/samples`: Latest samples as JSON
//! - `/health`: Health check endpoint
//! - `/config`: Configuration display endpoint
//! - `/doc`: Documentation endpoint

pub mod config;
pub mod doc;
pub mod health;
pub mod metrics;
pub mod samples;

// Re-export handlers
pub use config::config_handler;
pub use doc::doc_handler;
pub use health::health_handler;
pub use metrics::metrics_handler;
pub use samples::samples_handler;
