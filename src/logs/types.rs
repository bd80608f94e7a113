use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogEventType {
    Transition,
    Data,
    Error,
}

/// One append-only journal entry under `logs.events`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub timestamp: f64,
    pub state_id: i32,
    #[serde(rename = "type")]
    pub event_type: LogEventType,
    #[serde(default)]
    pub details: Map<String, Value>,
}

/// Keys used inside `details`
pub mod details {
    pub const FROM_STATE_ID: &str = "from_state_id";
    pub const TO_STATE_ID: &str = "to_state_id";
    pub const OCCURRED_ERROR: &str = "occurred_error";
    pub const REPLACED_COMPONENTS: &str = "replaced_components";
    pub const DESTINATION: &str = "destination";
    pub const WIPE_DEVICE: &str = "wipe_device";
    pub const WP_DISABLE_METHOD: &str = "wp_disable_method";
    pub const RSU_CHALLENGE_CODE: &str = "rsu_challenge_code";
    pub const RSU_HWID: &str = "rsu_hwid";
    pub const RESTOCK_OPTION: &str = "restock_option";
    pub const LOG_PATH: &str = "log_path";
    pub const ADDITIONAL_ACTIVITY: &str = "additional_activity";
}
