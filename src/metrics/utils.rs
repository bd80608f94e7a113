use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::types::{AdditionalActivity, MetricsSnapshot, StateMetricsData, StateMetricsMap};
use super::{keys, MetricsError};
use crate::error::RmadErrorCode;
use crate::state::StateCase;
use crate::store::{keys::METRICS, JsonStore};

fn metrics_object(store: &JsonStore) -> Map<String, Value> {
    match store.get_value(METRICS) {
        Some(Value::Object(object)) => object,
        Some(_) => {
            warn!("Metrics entry is not an object, starting over");
            Map::new()
        }
        None => Map::new(),
    }
}

pub fn get_metrics_value<T: DeserializeOwned>(store: &JsonStore, key: &str) -> Option<T> {
    let value = metrics_object(store).remove(key)?;
    serde_json::from_value(value).ok()
}

pub fn set_metrics_value<T: Serialize>(store: &JsonStore, key: &str, value: &T) -> bool {
    match serde_json::to_value(value) {
        Ok(value) => set_metrics_values(store, vec![(key, value)]),
        Err(e) => {
            warn!(key = %key, error = %e, "Failed to serialize metrics value");
            false
        }
    }
}

/// Updates several metrics keys with one store write
pub fn set_metrics_values(store: &JsonStore, entries: Vec<(&str, Value)>) -> bool {
    let mut metrics = metrics_object(store);
    for (key, value) in entries {
        metrics.insert(key.to_string(), value);
    }
    store.set_value(METRICS, Value::Object(metrics))
}

pub fn snapshot(store: &JsonStore) -> MetricsSnapshot {
    MetricsSnapshot::from_object(&metrics_object(store))
}

/// Sets the first and current setup timestamps on a fresh session
pub fn initialize_setup_timestamps(store: &JsonStore, now: f64) -> bool {
    if get_metrics_value::<f64>(store, keys::FIRST_SETUP_TIMESTAMP).is_some() {
        return true;
    }
    set_metrics_values(
        store,
        vec![
            (keys::FIRST_SETUP_TIMESTAMP, json!(now)),
            (keys::SETUP_TIMESTAMP, json!(now)),
        ],
    )
}

/// Appends `error` to the occurred-errors list unless it is an expected code
pub fn record_occurred_error(store: &JsonStore, error: RmadErrorCode) -> Result<(), MetricsError> {
    if error.is_benign() {
        return Ok(());
    }

    let mut errors: Vec<String> =
        get_metrics_value(store, keys::OCCURRED_ERRORS).unwrap_or_default();
    errors.push(error.symbol().to_string());

    if !set_metrics_values(store, vec![(keys::OCCURRED_ERRORS, json!(errors))]) {
        return Err(MetricsError::CannotWrite);
    }
    debug!(error = %error.symbol(), "Recorded occurred error");
    Ok(())
}

fn running_time_update(
    store: &JsonStore,
    now: f64,
) -> Result<Vec<(&'static str, Value)>, MetricsError> {
    let setup: f64 = get_metrics_value(store, keys::SETUP_TIMESTAMP).ok_or_else(|| {
        MetricsError::MissingValue {
            key: keys::SETUP_TIMESTAMP.to_string(),
        }
    })?;
    let delta = now - setup;
    if delta < 0.0 {
        return Err(MetricsError::NegativeDuration {
            what: "running time".to_string(),
            delta,
        });
    }
    let running_time: f64 = get_metrics_value(store, keys::RUNNING_TIME).unwrap_or(0.0);

    Ok(vec![
        (keys::RUNNING_TIME, json!(running_time + delta)),
        (keys::SETUP_TIMESTAMP, json!(now)),
    ])
}

/// Folds the time since the last setup into the running-time accumulator
///
/// The accumulator and the reset timestamp land in the same store write.
pub fn update_running_time(store: &JsonStore, now: f64) -> Result<(), MetricsError> {
    let updates = running_time_update(store, now)?;
    if !set_metrics_values(store, updates) {
        return Err(MetricsError::CannotWrite);
    }
    Ok(())
}

/// Records an additional activity; power-cycle activities also settle the running time
pub fn record_additional_activity(
    store: &JsonStore,
    now: f64,
    activity: AdditionalActivity,
) -> Result<(), MetricsError> {
    if activity == AdditionalActivity::Nothing {
        return Ok(());
    }

    let mut updates = if activity.is_power_cycle() {
        running_time_update(store, now)?
    } else {
        Vec::new()
    };

    let mut activities: Vec<String> =
        get_metrics_value(store, keys::ADDITIONAL_ACTIVITIES).unwrap_or_default();
    activities.push(activity.symbol().to_string());
    updates.push((keys::ADDITIONAL_ACTIVITIES, json!(activities)));

    if !set_metrics_values(store, updates) {
        return Err(MetricsError::CannotWrite);
    }
    debug!(activity = %activity.symbol(), "Recorded additional activity");
    Ok(())
}

pub fn get_state_metrics(store: &JsonStore) -> StateMetricsMap {
    get_metrics_value(store, keys::STATE_METRICS).unwrap_or_default()
}

fn set_state_metrics(store: &JsonStore, map: &StateMetricsMap) -> Result<(), MetricsError> {
    if !set_metrics_value(store, keys::STATE_METRICS, map) {
        return Err(MetricsError::CannotWrite);
    }
    Ok(())
}

fn state_key(state_case: StateCase) -> String {
    state_case.as_i32().to_string()
}

/// Closes the timer of `from` and opens (or re-opens) the record of `to`
pub fn update_state_metrics_on_transition(
    store: &JsonStore,
    from: StateCase,
    to: StateCase,
    now: f64,
) -> Result<(), MetricsError> {
    let mut map = get_state_metrics(store);

    if from != StateCase::NotSet {
        if let Some(record) = map.get_mut(&state_key(from)) {
            record.calculate_overall_time(now)?;
        }
    }

    let record = map
        .entry(state_key(to))
        .or_insert_with(|| StateMetricsData::new(to, now));
    record.setup_timestamp = now;
    record.transition_count += 1;

    set_state_metrics(store, &map)
}

/// Closes the timer of the current state and flags it as the abort point
pub fn update_state_metrics_on_abort(
    store: &JsonStore,
    current: StateCase,
    now: f64,
) -> Result<(), MetricsError> {
    let mut map = get_state_metrics(store);
    let record = map
        .entry(state_key(current))
        .or_insert_with(|| StateMetricsData::new(current, now));
    record.calculate_overall_time(now)?;
    record.is_aborted = true;
    set_state_metrics(store, &map)
}

/// Closes the timer of the final state when the repair completes
pub fn update_state_metrics_on_complete(
    store: &JsonStore,
    current: StateCase,
    now: f64,
) -> Result<(), MetricsError> {
    let mut map = get_state_metrics(store);
    if let Some(record) = map.get_mut(&state_key(current)) {
        record.calculate_overall_time(now)?;
    }
    set_state_metrics(store, &map)
}

pub fn increment_get_log_count(store: &JsonStore, current: StateCase, now: f64) -> Result<(), MetricsError> {
    let mut map = get_state_metrics(store);
    map.entry(state_key(current))
        .or_insert_with(|| StateMetricsData::new(current, now))
        .get_log_count += 1;
    set_state_metrics(store, &map)
}

pub fn increment_save_log_count(store: &JsonStore, current: StateCase, now: f64) -> Result<(), MetricsError> {
    let mut map = get_state_metrics(store);
    map.entry(state_key(current))
        .or_insert_with(|| StateMetricsData::new(current, now))
        .save_log_count += 1;
    set_state_metrics(store, &map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn new_store(dir: &TempDir) -> JsonStore {
        JsonStore::open(dir.path().join("state"))
    }

    #[test]
    fn test_setup_timestamps_initialized_once() {
        let dir = TempDir::new().unwrap();
        let store = new_store(&dir);

        assert!(initialize_setup_timestamps(&store, 100.0));
        assert!(initialize_setup_timestamps(&store, 200.0));

        let metrics = snapshot(&store);
        assert_eq!(metrics.first_setup_timestamp, Some(100.0));
        assert_eq!(metrics.setup_timestamp, Some(100.0));
    }

    #[test]
    fn test_occurred_errors_skip_benign_codes() {
        let dir = TempDir::new().unwrap();
        let store = new_store(&dir);

        record_occurred_error(&store, RmadErrorCode::Ok).unwrap();
        record_occurred_error(&store, RmadErrorCode::Wait).unwrap();
        record_occurred_error(&store, RmadErrorCode::RequestArgsMissing).unwrap();
        record_occurred_error(&store, RmadErrorCode::RequestArgsMissing).unwrap();

        assert_eq!(
            snapshot(&store).occurred_errors,
            vec![
                "RMAD_ERROR_REQUEST_ARGS_MISSING".to_string(),
                "RMAD_ERROR_REQUEST_ARGS_MISSING".to_string()
            ]
        );
    }

    #[test]
    fn test_power_cycle_activity_settles_running_time() {
        let dir = TempDir::new().unwrap();
        let store = new_store(&dir);
        initialize_setup_timestamps(&store, 1_000.0);

        record_additional_activity(&store, 1_060.0, AdditionalActivity::Reboot).unwrap();
        record_additional_activity(&store, 1_100.0, AdditionalActivity::Diagnostics).unwrap();
        record_additional_activity(&store, 1_100.0, AdditionalActivity::Nothing).unwrap();

        let metrics = snapshot(&store);
        assert_eq!(metrics.running_time, 60.0);
        assert_eq!(metrics.setup_timestamp, Some(1_060.0));
        assert_eq!(metrics.first_setup_timestamp, Some(1_000.0));
        assert_eq!(
            metrics.additional_activities,
            vec![
                "RMAD_ADDITIONAL_ACTIVITY_REBOOT".to_string(),
                "RMAD_ADDITIONAL_ACTIVITY_DIAGNOSTICS".to_string()
            ]
        );
    }

    #[test]
    fn test_running_time_rejects_backwards_clock() {
        let dir = TempDir::new().unwrap();
        let store = new_store(&dir);
        initialize_setup_timestamps(&store, 1_000.0);

        let result = update_running_time(&store, 900.0);
        assert!(matches!(result, Err(MetricsError::NegativeDuration { .. })));
        assert_eq!(snapshot(&store).running_time, 0.0);
        assert_eq!(snapshot(&store).setup_timestamp, Some(1_000.0));
    }

    #[test]
    fn test_state_metrics_transitions() {
        let dir = TempDir::new().unwrap();
        let store = new_store(&dir);

        update_state_metrics_on_transition(&store, StateCase::NotSet, StateCase::Welcome, 10.0)
            .unwrap();
        update_state_metrics_on_transition(
            &store,
            StateCase::Welcome,
            StateCase::ComponentsRepair,
            25.0,
        )
        .unwrap();
        update_state_metrics_on_transition(
            &store,
            StateCase::ComponentsRepair,
            StateCase::Welcome,
            30.0,
        )
        .unwrap();

        let map = get_state_metrics(&store);
        let welcome = &map["1"];
        assert_eq!(welcome.overall_time, 15.0);
        assert_eq!(welcome.transition_count, 2);
        assert_eq!(welcome.setup_timestamp, 30.0);
        assert_eq!(map["2"].overall_time, 5.0);

        update_state_metrics_on_abort(&store, StateCase::Welcome, 40.0).unwrap();
        let map = get_state_metrics(&store);
        assert!(map["1"].is_aborted);
        assert_eq!(map["1"].overall_time, 25.0);
        assert!(!map["2"].is_aborted);
    }

    #[test]
    fn test_log_counters() {
        let dir = TempDir::new().unwrap();
        let store = new_store(&dir);

        increment_get_log_count(&store, StateCase::Welcome, 1.0).unwrap();
        increment_get_log_count(&store, StateCase::Welcome, 2.0).unwrap();
        increment_save_log_count(&store, StateCase::Welcome, 3.0).unwrap();

        let map = get_state_metrics(&store);
        assert_eq!(map["1"].get_log_count, 2);
        assert_eq!(map["1"].save_log_count, 1);
    }
}
