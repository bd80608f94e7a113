// RMA session metrics
// Counters, timers and audit lists kept under the `metrics` key of the store

pub mod storage;
pub mod types;
pub mod utils;

pub use storage::{FinalMetricsRecord, MetricsStorage, SessionOutcome};
pub use types::*;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Negative duration for {what}: {delta}s")]
    NegativeDuration { what: String, delta: f64 },

    #[error("Missing metrics value: {key}")]
    MissingValue { key: String },

    #[error("Failed to write metrics to the store")]
    CannotWrite,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Keys inside the `metrics` object
pub mod keys {
    pub const FIRST_SETUP_TIMESTAMP: &str = "first_setup_timestamp";
    pub const SETUP_TIMESTAMP: &str = "setup_timestamp";
    pub const RUNNING_TIME: &str = "running_time";
    pub const OCCURRED_ERRORS: &str = "occurred_errors";
    pub const ADDITIONAL_ACTIVITIES: &str = "additional_activities";
    pub const RO_FIRMWARE_VERIFIED: &str = "ro_firmware_verified";
    pub const WP_DISABLE_METHOD: &str = "wp_disable_method";
    pub const REPLACED_COMPONENT_NAMES: &str = "replaced_component_names";
    pub const IS_COMPLETE: &str = "is_complete";
    pub const STATE_METRICS: &str = "state_metrics";
}
