use serde_json::json;
use tracing::{info, warn};

use super::{wp_method, BaseState, GetNextStateCaseReply, HandlerContext, StateHandler};
use crate::error::RmadErrorCode;
use crate::logs;
use crate::metrics::{keys as metrics_keys, utils as metrics_utils};
use crate::state::{RmadState, StateCase};
use crate::store::keys;

/// Same-owner repairs choose whether user data survives
#[derive(Debug)]
pub struct WipeSelectionStateHandler {
    base: BaseState,
}

impl WipeSelectionStateHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            base: BaseState::new(ctx, StateCase::WipeSelection),
        }
    }

    fn reply(error: RmadErrorCode) -> GetNextStateCaseReply {
        GetNextStateCaseReply::stay(error, StateCase::WipeSelection)
    }
}

impl StateHandler for WipeSelectionStateHandler {
    fn base(&self) -> &BaseState {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseState {
        &mut self.base
    }

    fn is_abortable(&self) -> bool {
        true
    }

    fn initialize_state(&mut self) -> RmadErrorCode {
        let store = &self.base.ctx.store;
        if store.get::<bool>(keys::WP_DISABLE_REQUIRED) != Some(true)
            || store.get::<bool>(keys::SAME_OWNER).is_none()
        {
            return RmadErrorCode::StateHandlerInitializationFailed;
        }
        self.retrieve_state();
        RmadErrorCode::Ok
    }

    fn get_next_state_case(&mut self, state: &RmadState) -> GetNextStateCaseReply {
        let RmadState::WipeSelection(payload) = state else {
            return Self::reply(RmadErrorCode::RequestInvalid);
        };
        let Some(wipe_device) = payload.wipe_device else {
            return Self::reply(RmadErrorCode::RequestArgsMissing);
        };

        self.base.state = state.clone();
        if !self.store_state() {
            return Self::reply(RmadErrorCode::CannotWrite);
        }

        let ctx = self.base.ctx.clone();
        let store = &ctx.store;
        let hwwp_enabled = ctx.hwwp_enabled();
        let ccd_blocked = store.get::<bool>(keys::CCD_BLOCKED).unwrap_or(false);

        let mut updates = vec![(keys::WIPE_DEVICE.to_string(), json!(wipe_device))];
        if !hwwp_enabled {
            updates.push((keys::WP_DISABLE_SKIPPED.to_string(), json!(true)));
            updates.push((keys::WP_DISABLE_METHOD.to_string(), json!(wp_method::SKIPPED)));
        }
        if !store.set_values(updates) {
            return Self::reply(RmadErrorCode::CannotWrite);
        }
        if !hwwp_enabled
            && !metrics_utils::set_metrics_value(
                store,
                metrics_keys::WP_DISABLE_METHOD,
                &wp_method::SKIPPED,
            )
        {
            return Self::reply(RmadErrorCode::CannotWrite);
        }
        if !logs::record_wipe_device(store, ctx.now(), wipe_device) {
            warn!("Failed to record wipe selection event");
        }
        info!(wipe_device = %wipe_device, "Wipe selection recorded");

        let next = if !hwwp_enabled {
            StateCase::WpDisableComplete
        } else if ccd_blocked {
            StateCase::WpDisableRsu
        } else if wipe_device {
            StateCase::WpDisableMethod
        } else {
            // Keeping user data rules out RSU, which wipes the device.
            StateCase::WpDisablePhysical
        };
        GetNextStateCaseReply::next(next)
    }
}
