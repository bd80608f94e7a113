use serde_json::json;
use tracing::{debug, warn};

use super::{wp_method, BaseState, GetNextStateCaseReply, HandlerContext, StateHandler};
use crate::error::RmadErrorCode;
use crate::logs;
use crate::metrics::{keys as metrics_keys, utils as metrics_utils};
use crate::state::{RmadState, StateCase, WpDisablePhysicalAction, WpDisablePhysicalState};
use crate::store::keys;

/// Technician releases write protect by opening the device
#[derive(Debug)]
pub struct WpDisablePhysicalStateHandler {
    base: BaseState,
}

impl WpDisablePhysicalStateHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            base: BaseState::new(ctx, StateCase::WpDisablePhysical),
        }
    }

    fn reply(error: RmadErrorCode) -> GetNextStateCaseReply {
        GetNextStateCaseReply::stay(error, StateCase::WpDisablePhysical)
    }
}

impl StateHandler for WpDisablePhysicalStateHandler {
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
        let Some(wipe_device) = self.base.ctx.store.get::<bool>(keys::WIPE_DEVICE) else {
            return RmadErrorCode::StateHandlerInitializationFailed;
        };
        // Without a wipe the write-protected data must stay reachable until the end.
        let action = if wipe_device {
            WpDisablePhysicalAction::AssembleDevice
        } else {
            WpDisablePhysicalAction::KeepDeviceOpen
        };
        self.base.state = RmadState::WpDisablePhysical(WpDisablePhysicalState { action });
        RmadErrorCode::Ok
    }

    fn get_next_state_case(&mut self, state: &RmadState) -> GetNextStateCaseReply {
        if !matches!(state, RmadState::WpDisablePhysical(_)) {
            return Self::reply(RmadErrorCode::RequestInvalid);
        }
        let ctx = self.base.ctx.clone();
        if ctx.hwwp_enabled() {
            debug!("Waiting for hardware write protect to be disabled");
            return Self::reply(RmadErrorCode::Wait);
        }

        let method = match &self.base.state {
            RmadState::WpDisablePhysical(WpDisablePhysicalState {
                action: WpDisablePhysicalAction::KeepDeviceOpen,
            }) => wp_method::PHYSICAL_KEEP_DEVICE_OPEN,
            _ => wp_method::PHYSICAL_ASSEMBLE_DEVICE,
        };
        let store = &ctx.store;
        if !store.set_values(vec![(keys::WP_DISABLE_METHOD.to_string(), json!(method))])
            || !metrics_utils::set_metrics_value(store, metrics_keys::WP_DISABLE_METHOD, &method)
        {
            return Self::reply(RmadErrorCode::CannotWrite);
        }
        if !logs::record_wp_disable_method(store, ctx.now(), StateCase::WpDisablePhysical, method) {
            warn!("Failed to record write protect disable method event");
        }
        GetNextStateCaseReply::next(StateCase::WpDisableComplete)
    }
}
