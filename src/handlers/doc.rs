//! Documentation endpoint handler.
//!
//! This module provides the `/doc` endpoint handler that describes the
//! endpoints, samples and configuration of the meter.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use tracing::{debug, instrument};

use crate::handlers::health::FOOTER_TEXT;
use crate::state::SharedState;

/// Handler for the /doc endpoint.
#[instrument(skip(state))]
pub async fn doc_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /doc request");
    state.health_stats.record_http_request();

    let version = env!("CARGO_PKG_VERSION");
    let port = state.config.port.unwrap_or(herakles_compute_meter::config::DEFAULT_PORT);
    let doc = format!(
        r#"HERAKLES COMPUTE METER - DOCUMENTATION
======================================

VERSION: {version}
DESCRIPTION: Per-instance usage metering for virtualized compute hosts

HTTP ENDPOINTS
--------------
GET /metrics     - Prometheus rendering of the latest cycle
GET /samples     - Latest cycle as JSON (?meter=cpu*,!cpu_util&resource_id=...)
GET /health      - Cycle statistics (plain text)
GET /config      - Effective configuration (plain text)
GET /doc         - This documentation (plain text)

SAMPLES
-------
instance                  gauge       instance   1 per running instance
instance:<flavor>         gauge       instance   1 per running instance
cpu                       cumulative  ns         CPU time since boot
cpu_util                  gauge       %          utilization since last cycle
disk.read.requests        cumulative  request    summed over all disks
disk.read.bytes           cumulative  B
disk.write.requests       cumulative  request
disk.write.bytes          cumulative  B
network.incoming.bytes    cumulative  B          one resource per vNIC
network.outgoing.bytes    cumulative  B
network.incoming.packets  cumulative  packet
network.outgoing.packets  cumulative  packet

Prometheus series: herakles_compute_meter_volume{{meter,unit,type,resource_id,user_id,project_id}}

CONFIGURATION
-------------
Config file locations (in order):
1. CLI specified: -c /path/to/config.yaml
2. System config: /etc/herakles/compute-meter.yaml
3. Current directory: ./herakles-compute-meter.yaml

Key configuration options:
- interval_secs: Seconds between cycles (default: 60)
- meters: Sample name patterns (default: ["*"])
- parallelism: Collection threads (default: 1)
- tracker_retention_cycles: Cycles before a vanished instance is forgotten (default: 3)
- inventory_file: Instance inventory JSON

EXAMPLE USAGE
-------------
curl http://localhost:{port}/metrics
curl 'http://localhost:{port}/samples?meter=cpu_util'

{FOOTER_TEXT}
"#
    );

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; charset=utf-8")],
        doc,
    )
}
