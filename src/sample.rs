//! Normalized metering samples.
//!
//! A [`Sample`] is produced fresh every cycle and never mutated afterwards.
//! Identity (user, project, resource) is kept separate from the descriptive
//! `resource_metadata`, and construction guarantees that the metadata never
//! repeats one of the identity keys.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Auxiliary descriptive fields attached to a sample.
pub type Metadata = BTreeMap<String, Value>;

/// Keys owned by [`Identity`]; never allowed in `resource_metadata`.
pub const IDENTITY_KEYS: [&str; 3] = ["user_id", "project_id", "resource_id"];

/// How a sample's volume evolves over time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    /// Point value.
    Gauge,
    /// Monotonically increasing since some epoch.
    Cumulative,
    /// Increment over one interval.
    Delta,
}

impl SampleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Cumulative => "cumulative",
            Self::Delta => "delta",
        }
    }
}

/// Sample value, integral for raw counters and floating for derived rates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Volume {
    Int(i64),
    Float(f64),
}

impl Volume {
    pub fn as_f64(&self) -> f64 {
        match *self {
            Self::Int(v) => v as f64,
            Self::Float(v) => v,
        }
    }
}

impl From<i64> for Volume {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for Volume {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

/// Who owns the metered resource and which resource it is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub project_id: String,
    pub resource_id: String,
}

/// One normalized metric observation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    name: String,
    #[serde(rename = "type")]
    kind: SampleKind,
    unit: String,
    volume: Volume,
    #[serde(flatten)]
    identity: Identity,
    #[serde(serialize_with = "serialize_timestamp")]
    timestamp: DateTime<Utc>,
    resource_metadata: Metadata,
}

impl Sample {
    pub fn new(
        name: impl Into<String>,
        kind: SampleKind,
        unit: impl Into<String>,
        volume: impl Into<Volume>,
        identity: Identity,
        timestamp: DateTime<Utc>,
        mut resource_metadata: Metadata,
    ) -> Self {
        let name = name.into();
        for key in IDENTITY_KEYS {
            if resource_metadata.remove(key).is_some() {
                debug!("Dropped identity key '{}' from metadata of sample {}", key, name);
            }
        }

        Self {
            name,
            kind,
            unit: unit.into(),
            volume: volume.into(),
            identity,
            timestamp,
            resource_metadata,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> SampleKind {
        self.kind
    }

    pub fn unit(&self) -> &str {
        &self.unit
    }

    pub fn volume(&self) -> Volume {
        self.volume
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn resource_id(&self) -> &str {
        &self.identity.resource_id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Collection time rendered as ISO-8601.
    pub fn isotime(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    pub fn resource_metadata(&self) -> &Metadata {
        &self.resource_metadata
    }
}

fn serialize_timestamp<S>(ts: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Micros, true))
}
