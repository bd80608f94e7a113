//! One handler per workflow state
//!
//! A handler validates the payload submitted for its state, performs the
//! store-backed side effects and decides which state comes next. Handlers never
//! fail by panicking or returning `Err`; every outcome is an `RmadErrorCode`.

pub mod calibration_map;
pub mod check_calibration;
pub mod components_repair;
pub mod device_destination;
pub mod finalize;
pub mod provision_device;
pub mod registry;
pub mod repair_complete;
pub mod restock;
pub mod run_calibration;
pub mod setup_calibration;
pub mod update_device_info;
pub mod update_ro_firmware;
pub mod welcome;
pub mod wipe_selection;
pub mod wp_disable_complete;
pub mod wp_disable_method;
pub mod wp_disable_physical;
pub mod wp_disable_rsu;
pub mod wp_enable_physical;

use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::clock::Clock;
use crate::error::RmadErrorCode;
use crate::hardware::Hardware;
use crate::metrics::AdditionalActivity;
use crate::state::{RmadState, StateCase};
use crate::store::{keys, SharedStore};

pub use registry::StateHandlerRegistry;

/// Marker file names looked up in the working directory
pub const DISABLE_CALIBRATION_MARKER: &str = "disable_calibration";
pub const DISABLE_POWERWASH_MARKER: &str = "disable_powerwash";

/// Values persisted under `wp_disable_method`
pub mod wp_method {
    pub const SKIPPED: &str = "SKIPPED";
    pub const RSU: &str = "RSU";
    pub const PHYSICAL_ASSEMBLE_DEVICE: &str = "PHYSICAL_ASSEMBLE_DEVICE";
    pub const PHYSICAL_KEEP_DEVICE_OPEN: &str = "PHYSICAL_KEEP_DEVICE_OPEN";
}

/// Collaborators shared by every handler
#[derive(Clone)]
pub struct HandlerContext {
    pub store: SharedStore,
    pub clock: Arc<dyn Clock>,
    pub hardware: Hardware,
    pub working_dir: PathBuf,
}

impl std::fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerContext")
            .field("store", &self.store)
            .field("working_dir", &self.working_dir)
            .finish_non_exhaustive()
    }
}

impl HandlerContext {
    pub fn now(&self) -> f64 {
        self.clock.now_seconds()
    }

    pub fn marker_exists(&self, name: &str) -> bool {
        self.working_dir.join(name).exists()
    }

    /// An unreadable switch counts as enabled
    pub fn hwwp_enabled(&self) -> bool {
        self.hardware.write_protect.hardware_wp_enabled() != Some(false)
    }
}

/// Decision returned by `StateHandler::get_next_state_case`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetNextStateCaseReply {
    pub error: RmadErrorCode,
    pub state_case: StateCase,
    pub additional_activity: AdditionalActivity,
}

impl GetNextStateCaseReply {
    pub fn next(state_case: StateCase) -> Self {
        Self {
            error: RmadErrorCode::Ok,
            state_case,
            additional_activity: AdditionalActivity::Nothing,
        }
    }

    pub fn stay(error: RmadErrorCode, state_case: StateCase) -> Self {
        Self {
            error,
            state_case,
            additional_activity: AdditionalActivity::Nothing,
        }
    }

    pub fn with_activity(mut self, activity: AdditionalActivity) -> Self {
        self.additional_activity = activity;
        self
    }
}

/// Payload plus the shared context; embedded in every handler
#[derive(Debug)]
pub struct BaseState {
    pub ctx: HandlerContext,
    pub state: RmadState,
}

impl BaseState {
    pub fn new(ctx: HandlerContext, state_case: StateCase) -> Self {
        Self {
            ctx,
            state: RmadState::default_for(state_case),
        }
    }

    fn map_key(&self) -> String {
        self.state.state_case().as_i32().to_string()
    }

    /// Saves the payload under `state_map`
    pub fn store_state(&self) -> bool {
        let mut map = match self.ctx.store.get_value(keys::STATE_MAP) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        let value = match serde_json::to_value(&self.state) {
            Ok(value) => value,
            Err(e) => {
                warn!(state = %self.state.state_case(), error = %e, "Failed to serialize state");
                return false;
            }
        };
        map.insert(self.map_key(), value);
        self.ctx.store.set_value(keys::STATE_MAP, Value::Object(map))
    }

    /// Restores the payload saved by `store_state`, if any
    pub fn retrieve_state(&mut self) -> bool {
        let state_case = self.state.state_case();
        let Some(value) = self
            .ctx
            .store
            .get_value(keys::STATE_MAP)
            .and_then(|map| map.get(&self.map_key()).cloned())
        else {
            return false;
        };

        match serde_json::from_value::<RmadState>(value) {
            Ok(state) if state.state_case() == state_case => {
                self.state = state;
                true
            }
            Ok(state) => {
                warn!(expected = %state_case, found = %state.state_case(), "Stored state has the wrong tag");
                false
            }
            Err(e) => {
                debug!(state = %state_case, error = %e, "Stored state is unreadable");
                false
            }
        }
    }
}

/// Contract implemented by every workflow state
pub trait StateHandler: Send {
    fn base(&self) -> &BaseState;
    fn base_mut(&mut self) -> &mut BaseState;

    fn state_case(&self) -> StateCase {
        self.base().state.state_case()
    }

    /// Whether the workflow may come back to this state with `TransitionPreviousState`
    fn is_repeatable(&self) -> bool {
        true
    }

    /// Whether the RMA can still be aborted while this state is on the path
    fn is_abortable(&self) -> bool {
        false
    }

    /// Loads prerequisites and fills the default payload
    fn initialize_state(&mut self) -> RmadErrorCode;

    fn get_next_state_case(&mut self, state: &RmadState) -> GetNextStateCaseReply;

    /// Drops per-session caches when the workflow leaves the state
    fn cleanup_state(&mut self) {}

    fn state(&self) -> &RmadState {
        &self.base().state
    }

    fn store_state(&self) -> bool {
        self.base().store_state()
    }

    fn retrieve_state(&mut self) -> bool {
        self.base_mut().retrieve_state()
    }
}
