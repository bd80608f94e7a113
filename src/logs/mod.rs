//! Event journal kept under `logs.events` in the store
//!
//! Events are only ever appended. Transition events are written by the
//! controller, data events by individual state handlers and error events by
//! the next-state wrapper.

pub mod types;

use chrono::DateTime;
use serde_json::{json, Map, Value};
use tracing::warn;

use crate::error::RmadErrorCode;
use crate::state::{RmadComponent, StateCase};
use crate::store::{keys::LOGS, JsonStore};

pub use types::{details, LogEvent, LogEventType};

const EVENTS: &str = "events";

pub fn get_events(store: &JsonStore) -> Vec<LogEvent> {
    store
        .get_value(LOGS)
        .and_then(|logs| logs.get(EVENTS).cloned())
        .and_then(|events| serde_json::from_value(events).ok())
        .unwrap_or_default()
}

fn append_event(store: &JsonStore, event: LogEvent) -> bool {
    let mut logs = match store.get_value(LOGS) {
        Some(Value::Object(logs)) => logs,
        _ => Map::new(),
    };
    let mut events = match logs.remove(EVENTS) {
        Some(Value::Array(events)) => events,
        _ => Vec::new(),
    };

    match serde_json::to_value(&event) {
        Ok(value) => events.push(value),
        Err(e) => {
            warn!(error = %e, "Failed to serialize log event");
            return false;
        }
    }
    logs.insert(EVENTS.to_string(), Value::Array(events));
    store.set_value(LOGS, Value::Object(logs))
}

fn append_data(store: &JsonStore, now: f64, state: StateCase, details: Map<String, Value>) -> bool {
    append_event(
        store,
        LogEvent {
            timestamp: now,
            state_id: state.as_i32(),
            event_type: LogEventType::Data,
            details,
        },
    )
}

fn single(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}

pub fn record_state_transition(store: &JsonStore, now: f64, from: StateCase, to: StateCase) -> bool {
    let mut details = Map::new();
    details.insert(details::FROM_STATE_ID.to_string(), json!(from.as_i32()));
    details.insert(details::TO_STATE_ID.to_string(), json!(to.as_i32()));
    append_event(
        store,
        LogEvent {
            timestamp: now,
            state_id: from.as_i32(),
            event_type: LogEventType::Transition,
            details,
        },
    )
}

pub fn record_error(store: &JsonStore, now: f64, state: StateCase, error: RmadErrorCode) -> bool {
    append_event(
        store,
        LogEvent {
            timestamp: now,
            state_id: state.as_i32(),
            event_type: LogEventType::Error,
            details: single(details::OCCURRED_ERROR, json!(error.symbol())),
        },
    )
}

pub fn record_selected_components(
    store: &JsonStore,
    now: f64,
    replaced: &[RmadComponent],
) -> bool {
    let names: Vec<&str> = replaced.iter().map(|c| c.name()).collect();
    append_data(
        store,
        now,
        StateCase::ComponentsRepair,
        single(details::REPLACED_COMPONENTS, json!(names)),
    )
}

pub fn record_device_destination(store: &JsonStore, now: f64, same_owner: bool) -> bool {
    let destination = if same_owner { "same" } else { "different" };
    append_data(
        store,
        now,
        StateCase::DeviceDestination,
        single(details::DESTINATION, json!(destination)),
    )
}

pub fn record_wipe_device(store: &JsonStore, now: f64, wipe_device: bool) -> bool {
    append_data(
        store,
        now,
        StateCase::WipeSelection,
        single(details::WIPE_DEVICE, json!(wipe_device)),
    )
}

pub fn record_wp_disable_method(store: &JsonStore, now: f64, state: StateCase, method: &str) -> bool {
    append_data(store, now, state, single(details::WP_DISABLE_METHOD, json!(method)))
}

pub fn record_rsu_challenge_code(store: &JsonStore, now: f64, challenge_code: &str, hwid: &str) -> bool {
    let mut details = Map::new();
    details.insert(details::RSU_CHALLENGE_CODE.to_string(), json!(challenge_code));
    details.insert(details::RSU_HWID.to_string(), json!(hwid));
    append_data(store, now, StateCase::WpDisableRsu, details)
}

pub fn record_restock_option(store: &JsonStore, now: f64, shutdown: bool) -> bool {
    let option = if shutdown { "shutdown" } else { "continue" };
    append_data(
        store,
        now,
        StateCase::Restock,
        single(details::RESTOCK_OPTION, json!(option)),
    )
}

pub fn record_saved_log(store: &JsonStore, now: f64, state: StateCase, path: &str) -> bool {
    append_data(store, now, state, single(details::LOG_PATH, json!(path)))
}

pub fn record_additional_activity(store: &JsonStore, now: f64, state: StateCase, symbol: &str) -> bool {
    append_data(store, now, state, single(details::ADDITIONAL_ACTIVITY, json!(symbol)))
}

fn state_name(id: i32) -> String {
    StateCase::from_i32(id)
        .map(|s| s.name().to_string())
        .unwrap_or_else(|| format!("Unknown({})", id))
}

fn describe_data(details: &Map<String, Value>) -> String {
    let str_of = |key: &str| details.get(key).and_then(Value::as_str).unwrap_or_default();

    if let Some(components) = details.get(details::REPLACED_COMPONENTS).and_then(Value::as_array) {
        let names: Vec<&str> = components.iter().filter_map(Value::as_str).collect();
        if names.is_empty() {
            return "No components replaced".to_string();
        }
        return format!("Replaced components: {}", names.join(", "));
    }
    if details.contains_key(details::DESTINATION) {
        return format!("Device destination: {}", str_of(details::DESTINATION));
    }
    if let Some(wipe) = details.get(details::WIPE_DEVICE).and_then(Value::as_bool) {
        return format!("Wipe device: {}", if wipe { "yes" } else { "no" });
    }
    if details.contains_key(details::WP_DISABLE_METHOD) {
        return format!("Write protect disable method: {}", str_of(details::WP_DISABLE_METHOD));
    }
    if details.contains_key(details::RSU_CHALLENGE_CODE) {
        return format!(
            "RSU challenge code: {}, HWID: {}",
            str_of(details::RSU_CHALLENGE_CODE),
            str_of(details::RSU_HWID)
        );
    }
    if details.contains_key(details::RESTOCK_OPTION) {
        return format!("Restock option: {}", str_of(details::RESTOCK_OPTION));
    }
    if details.contains_key(details::LOG_PATH) {
        return format!("Logs saved to {}", str_of(details::LOG_PATH));
    }
    if details.contains_key(details::ADDITIONAL_ACTIVITY) {
        return format!("Additional activity: {}", str_of(details::ADDITIONAL_ACTIVITY));
    }
    Value::Object(details.clone()).to_string()
}

fn format_timestamp(timestamp: f64) -> String {
    let millis = (timestamp * 1000.0).round() as i64;
    DateTime::from_timestamp_millis(millis)
        .map(|t| t.format("%Y-%m-%d %H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| timestamp.to_string())
}

/// Human readable rendering of the whole journal, one line per event
pub fn generate_logs_text(store: &JsonStore) -> String {
    let mut text = String::new();
    for event in get_events(store) {
        let description = match event.event_type {
            LogEventType::Transition => {
                let id_of = |key: &str| {
                    event
                        .details
                        .get(key)
                        .and_then(Value::as_i64)
                        .map(|id| id as i32)
                        .unwrap_or_default()
                };
                format!(
                    "Transitioned from {} to {}",
                    state_name(id_of(details::FROM_STATE_ID)),
                    state_name(id_of(details::TO_STATE_ID))
                )
            }
            LogEventType::Data => describe_data(&event.details),
            LogEventType::Error => format!(
                "ERROR: {}",
                event
                    .details
                    .get(details::OCCURRED_ERROR)
                    .and_then(Value::as_str)
                    .unwrap_or("unknown")
            ),
        };
        text.push_str(&format!(
            "[{}] {}: {}\n",
            format_timestamp(event.timestamp),
            state_name(event.state_id),
            description
        ));
    }
    text
}
