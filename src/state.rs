//! Application state management for the meter.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and used by the background polling task.

use chrono::{DateTime, Utc};
use herakles_compute_meter::{
    Collector, Config, CycleReport, HealthStats, InstanceSource, Publisher, SnapshotPublisher,
};
use prometheus::{Gauge, Registry};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::metrics::MeterMetrics;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// Status of the most recent polling cycle.
#[derive(Debug, Clone, Default)]
pub struct CycleStatus {
    pub last_report: Option<CycleReport>,
    pub last_updated: Option<DateTime<Utc>>,
    pub update_success: bool,
    pub is_updating: bool,
}

/// Global application state shared across requests and background tasks.
pub struct AppState {
    pub registry: Registry,
    pub metrics: MeterMetrics,
    pub scrape_duration: Gauge,
    /// Held from reset to gather so scrapes never see a half-filled family.
    pub scrape_lock: Mutex<()>,
    pub collector: Collector,
    pub source: Arc<dyn InstanceSource>,
    /// Latest completed cycle, served over HTTP.
    pub snapshot: Arc<SnapshotPublisher>,
    /// Everything the collector publishes to (includes `snapshot`).
    pub publisher: Arc<dyn Publisher>,
    pub status: RwLock<CycleStatus>,
    pub config: Arc<Config>,
    pub health_stats: Arc<HealthStats>,
}
