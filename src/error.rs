//! Error types for the metering core.
//!
//! Nothing in here is fatal to the process: every variant is recovered by
//! the collector for the instance/producer pairing that raised it.

use thiserror::Error;

/// Failure reported by an [`Inspector`](crate::inspector::Inspector).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InspectorError {
    #[error("instance {instance_name} not found by inspector")]
    InstanceNotFound { instance_name: String },

    #[error("inspection of {instance_name} failed: {reason}")]
    Inspection {
        instance_name: String,
        reason: String,
    },
}

impl InspectorError {
    pub fn inspection(instance_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Inspection {
            instance_name: instance_name.into(),
            reason: reason.into(),
        }
    }
}

/// Failure of a single producer for a single instance.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CollectError {
    #[error(transparent)]
    Inspection(#[from] InspectorError),

    #[error("instance {instance_id} is missing required attribute '{attribute}'")]
    Configuration {
        instance_id: String,
        attribute: &'static str,
    },
}

impl CollectError {
    pub fn missing(instance_id: impl Into<String>, attribute: &'static str) -> Self {
        Self::Configuration {
            instance_id: instance_id.into(),
            attribute,
        }
    }

    /// Short label used in logs and cycle statistics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Inspection(_) => "inspection",
            Self::Configuration { .. } => "configuration",
        }
    }
}
