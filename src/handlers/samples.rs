//! JSON view of the samples collected in the latest cycle.

use axum::{
    extract::{Query, State},
    Json,
};
use herakles_compute_meter::{MeterFilter, Sample};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::state::SharedState;

#[derive(Debug, Default, Deserialize)]
pub struct SamplesQuery {
    /// Comma-separated meter patterns, same syntax as the `meters` option.
    pub meter: Option<String>,
    pub resource_id: Option<String>,
}

/// Handler for the /samples endpoint.
#[instrument(skip(state))]
pub async fn samples_handler(
    State(state): State<SharedState>,
    Query(query): Query<SamplesQuery>,
) -> Json<Vec<Sample>> {
    debug!("Processing /samples request");
    state.health_stats.record_http_request();

    let filter = query.meter.as_deref().map(|m| {
        let patterns: Vec<&str> = m.split(',').map(str::trim).collect();
        MeterFilter::new(&patterns)
    });

    let latest = state.snapshot.latest();
    let samples: Vec<Sample> = latest
        .iter()
        .filter(|s| filter.as_ref().map_or(true, |f| f.accepts(s.name())))
        .filter(|s| {
            query
                .resource_id
                .as_deref()
                .map_or(true, |id| s.resource_id() == id)
        })
        .cloned()
        .collect();

    debug!("Returning {} of {} samples", samples.len(), latest.len());
    Json(samples)
}
