//! Crash-safe JSON key/value store
//!
//! One file, one JSON object, rewritten atomically on every mutation. The
//! store degrades to read-only instead of failing hard when the file cannot be
//! parsed or written.

pub mod json_store;
pub mod value;
pub mod writer;

use std::sync::Arc;
use thiserror::Error;

pub use json_store::{JsonStore, ReadError};
pub use value::StoreValue;
pub use writer::{AtomicFileWriter, DocumentWriter};

/// Shared handle given to the controller and to every state handler
pub type SharedStore = Arc<JsonStore>;

/// Errors from the durable write path
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Store is read-only")]
    ReadOnly,
}

/// Keys persisted in the store document
pub mod keys {
    pub const STATE_HISTORY: &str = "state_history";
    pub const CURRENT_STATE: &str = "current_state";
    pub const STATE_MAP: &str = "state_map";
    pub const NETWORK_CONNECTED: &str = "network_connected";
    pub const SAME_OWNER: &str = "same_owner";
    pub const WP_DISABLE_REQUIRED: &str = "wp_disable_required";
    pub const CCD_BLOCKED: &str = "ccd_blocked";
    pub const WIPE_DEVICE: &str = "wipe_device";
    pub const WP_DISABLE_METHOD: &str = "wp_disable_method";
    pub const WP_DISABLE_SKIPPED: &str = "wp_disable_skipped";
    pub const RSU_REBOOT_PENDING: &str = "rsu_reboot_pending";
    pub const MLB_REPAIR: &str = "mlb_repair";
    pub const REPLACED_COMPONENT_NAMES: &str = "replaced_component_names";
    pub const FIRMWARE_UPDATED: &str = "firmware_updated";
    pub const CALIBRATION_MAP: &str = "calibration_map";
    pub const PROVISION_FINISHED_STATUS: &str = "provision_finished_status";
    pub const METRICS: &str = "metrics";
    pub const LOGS: &str = "logs";
}
