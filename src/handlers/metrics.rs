//! Metrics endpoint handler for Prometheus scraping.
//!
//! The gauges are rebuilt from the latest completed cycle on every scrape,
//! so instances that vanished drop out of the output.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use prometheus::{Encoder, TextEncoder};
use std::time::Instant;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

/// Buffer capacity for metrics encoding.
const BUFFER_CAP: usize = 512 * 1024;

/// Error type for metrics endpoint failures.
#[derive(Debug)]
pub enum MetricsError {
    EncodingFailed,
}

impl IntoResponse for MetricsError {
    fn into_response(self) -> axum::response::Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to encode metrics",
        )
            .into_response()
    }
}

/// Handler for the /metrics endpoint.
#[instrument(skip(state))]
pub async fn metrics_handler(State(state): State<SharedState>) -> Result<String, MetricsError> {
    let start = Instant::now();
    debug!("Processing /metrics request");
    state.health_stats.record_http_request();

    let status = state.status.read().await.clone();
    let samples = state.snapshot.latest();

    let guard = state.scrape_lock.lock().await;
    // Reset metrics before populating with fresh data
    state.metrics.reset();
    state.metrics.set_samples(&samples);
    state.metrics.set_cycle(
        status.last_report.as_ref(),
        status.update_success,
        state.health_stats.total_cycles(),
    );

    let families = state.registry.gather();
    drop(guard);
    let mut buffer = Vec::with_capacity(BUFFER_CAP);
    let encoder = TextEncoder::new();

    if encoder.encode(&families, &mut buffer).is_err() {
        error!("Failed to encode Prometheus metrics");
        return Err(MetricsError::EncodingFailed);
    }

    let elapsed = start.elapsed().as_secs_f64();
    state.scrape_duration.set(elapsed);
    debug!(
        "Metrics request completed: {} samples, {} bytes, {:.3}ms",
        samples.len(),
        buffer.len(),
        elapsed * 1000.0
    );

    String::from_utf8(buffer).map_err(|_| MetricsError::EncodingFailed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MeterMetrics;
    use crate::state::{AppState, CycleStatus};
    use chrono::Utc;
    use herakles_compute_meter::{
        Collector, Config, FileInventory, HealthStats, Identity, Metadata, Publisher, Sample,
        SampleKind, SnapshotPublisher,
    };
    use prometheus::{Gauge, Registry};
    use std::sync::Arc;
    use tokio::sync::{Mutex, RwLock};

    fn state_with_samples(count: usize) -> SharedState {
        let snapshot = Arc::new(SnapshotPublisher::new());
        let samples = (0..count)
            .map(|i| {
                Sample::new(
                    "disk.read.bytes",
                    SampleKind::Cumulative,
                    "B",
                    i as i64,
                    Identity {
                        user_id: "user-1".into(),
                        project_id: "project-1".into(),
                        resource_id: format!("i-{i}"),
                    },
                    Utc::now(),
                    Metadata::new(),
                )
            })
            .collect();
        snapshot.publish(samples).unwrap();
        snapshot.flush().unwrap();

        let registry = Registry::new();
        let metrics = MeterMetrics::new(&registry).unwrap();
        let scrape_duration = Gauge::new("scrape_duration_seconds", "scrape").unwrap();
        let inventory = Arc::new(FileInventory::new("/nonexistent/inventory.json"));
        let config = Config::default();

        Arc::new(AppState {
            registry,
            metrics,
            scrape_duration,
            scrape_lock: Mutex::new(()),
            collector: Collector::from_config(inventory.clone(), &config).unwrap(),
            source: inventory,
            snapshot: snapshot.clone(),
            publisher: snapshot,
            status: RwLock::new(CycleStatus::default()),
            config: Arc::new(config),
            health_stats: Arc::new(HealthStats::new()),
        })
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_scrapes_see_every_series() {
        let state = state_with_samples(200);

        let scrapes: Vec<_> = (0..16)
            .map(|_| tokio::spawn(metrics_handler(State(state.clone()))))
            .collect();

        for scrape in scrapes {
            let body = scrape.await.unwrap().unwrap();
            let series = body
                .lines()
                .filter(|l| l.starts_with("herakles_compute_meter_volume{"))
                .count();
            assert_eq!(series, 200);
        }
    }
}
