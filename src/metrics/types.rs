use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::MetricsError;
use crate::state::StateCase;

/// Extra user or system activity that happened alongside a transition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdditionalActivity {
    #[default]
    Nothing,
    Shutdown,
    Reboot,
    BatteryCutoff,
    Diagnostics,
    OsUpdate,
}

impl AdditionalActivity {
    pub fn symbol(&self) -> &'static str {
        match self {
            AdditionalActivity::Nothing => "RMAD_ADDITIONAL_ACTIVITY_NOTHING",
            AdditionalActivity::Shutdown => "RMAD_ADDITIONAL_ACTIVITY_SHUTDOWN",
            AdditionalActivity::Reboot => "RMAD_ADDITIONAL_ACTIVITY_REBOOT",
            AdditionalActivity::BatteryCutoff => "RMAD_ADDITIONAL_ACTIVITY_BATTERY_CUTOFF",
            AdditionalActivity::Diagnostics => "RMAD_ADDITIONAL_ACTIVITY_DIAGNOSTICS",
            AdditionalActivity::OsUpdate => "RMAD_ADDITIONAL_ACTIVITY_OS_UPDATE",
        }
    }

    /// Activities after which the daemon stops running for a while
    pub fn is_power_cycle(&self) -> bool {
        matches!(
            self,
            AdditionalActivity::Shutdown
                | AdditionalActivity::Reboot
                | AdditionalActivity::BatteryCutoff
        )
    }
}

/// Per-state counters and timers, keyed by state id in the store
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateMetricsData {
    pub state_case: i32,
    pub is_aborted: bool,
    pub setup_timestamp: f64,
    pub overall_time: f64,
    pub transition_count: i32,
    pub get_log_count: i32,
    pub save_log_count: i32,
}

impl StateMetricsData {
    pub fn new(state_case: StateCase, now: f64) -> Self {
        Self {
            state_case: state_case.as_i32(),
            setup_timestamp: now,
            ..Default::default()
        }
    }

    /// Adds the time since the last setup to `overall_time` and restarts the timer
    ///
    /// A clock that moved backwards is an error rather than a negative duration.
    pub fn calculate_overall_time(&mut self, now: f64) -> Result<(), MetricsError> {
        let delta = now - self.setup_timestamp;
        if delta < 0.0 {
            return Err(MetricsError::NegativeDuration {
                what: format!("state {}", self.state_case),
                delta,
            });
        }
        self.overall_time += delta;
        self.setup_timestamp = now;
        Ok(())
    }
}

pub type StateMetricsMap = BTreeMap<String, StateMetricsData>;

/// Everything kept under the `metrics` key, as one typed view
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSnapshot {
    pub first_setup_timestamp: Option<f64>,
    pub setup_timestamp: Option<f64>,
    pub running_time: f64,
    pub occurred_errors: Vec<String>,
    pub additional_activities: Vec<String>,
    pub ro_firmware_verified: Option<bool>,
    pub wp_disable_method: Option<String>,
    pub replaced_component_names: Vec<String>,
    pub is_complete: bool,
    pub state_metrics: StateMetricsMap,
}

impl MetricsSnapshot {
    pub fn from_object(object: &Map<String, Value>) -> Self {
        serde_json::from_value(Value::Object(object.clone())).unwrap_or_default()
    }
}
