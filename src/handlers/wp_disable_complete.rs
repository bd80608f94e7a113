use tracing::{info, warn};

use super::{wp_method, BaseState, GetNextStateCaseReply, HandlerContext, StateHandler};
use crate::error::RmadErrorCode;
use crate::state::{RmadState, StateCase, WpDisableCompleteAction, WpDisableCompleteState};
use crate::store::keys;

/// Write protect is off; the RMA can no longer be aborted from here on
#[derive(Debug)]
pub struct WpDisableCompleteStateHandler {
    base: BaseState,
}

impl WpDisableCompleteStateHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            base: BaseState::new(ctx, StateCase::WpDisableComplete),
        }
    }
}

impl StateHandler for WpDisableCompleteStateHandler {
    fn base(&self) -> &BaseState {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseState {
        &mut self.base
    }

    fn is_repeatable(&self) -> bool {
        false
    }

    fn initialize_state(&mut self) -> RmadErrorCode {
        let store = &self.base.ctx.store;
        let skipped = store.get::<bool>(keys::WP_DISABLE_SKIPPED).unwrap_or(false);
        let method = store.get::<String>(keys::WP_DISABLE_METHOD);

        let action = match (skipped, method.as_deref()) {
            (true, _) => WpDisableCompleteAction::SkippedAssembleDevice,
            (false, Some(wp_method::RSU)) => WpDisableCompleteAction::CompleteNoOp,
            (false, Some(wp_method::PHYSICAL_ASSEMBLE_DEVICE)) => {
                WpDisableCompleteAction::CompleteAssembleDevice
            }
            (false, Some(wp_method::PHYSICAL_KEEP_DEVICE_OPEN)) => {
                WpDisableCompleteAction::CompleteKeepDeviceOpen
            }
            (false, other) => {
                warn!(method = ?other, "No write protect disable method recorded");
                return RmadErrorCode::StateHandlerInitializationFailed;
            }
        };
        self.base.state = RmadState::WpDisableComplete(WpDisableCompleteState { action });
        RmadErrorCode::Ok
    }

    fn get_next_state_case(&mut self, state: &RmadState) -> GetNextStateCaseReply {
        if !matches!(state, RmadState::WpDisableComplete(_)) {
            return GetNextStateCaseReply::stay(
                RmadErrorCode::RequestInvalid,
                StateCase::WpDisableComplete,
            );
        }
        if !self.base.ctx.hardware.write_protect.disable_software_wp() {
            return GetNextStateCaseReply::stay(RmadErrorCode::WpEnabled, StateCase::WpDisableComplete);
        }
        info!("Software write protect disabled");
        GetNextStateCaseReply::next(StateCase::UpdateRoFirmware)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_utils::TestContext;

    #[test]
    fn test_action_follows_method() {
        let t = TestContext::new();
        let mut handler = WpDisableCompleteStateHandler::new(t.ctx.clone());
        assert_eq!(
            handler.initialize_state(),
            RmadErrorCode::StateHandlerInitializationFailed
        );

        assert!(t.store().set(keys::WP_DISABLE_METHOD, wp_method::RSU.to_string()));
        assert_eq!(handler.initialize_state(), RmadErrorCode::Ok);
        assert_eq!(
            handler.state(),
            &RmadState::WpDisableComplete(WpDisableCompleteState {
                action: WpDisableCompleteAction::CompleteNoOp
            })
        );

        assert!(t.store().set(keys::WP_DISABLE_SKIPPED, true));
        handler.initialize_state();
        assert_eq!(
            handler.state(),
            &RmadState::WpDisableComplete(WpDisableCompleteState {
                action: WpDisableCompleteAction::SkippedAssembleDevice
            })
        );
    }

    #[test]
    fn test_disables_software_write_protect() {
        let t = TestContext::new();
        assert!(t.store().set(keys::WP_DISABLE_METHOD, wp_method::RSU.to_string()));
        let mut handler = WpDisableCompleteStateHandler::new(t.ctx.clone());
        handler.initialize_state();
        assert!(!handler.is_repeatable());
        assert!(!handler.is_abortable());

        let reply = handler.get_next_state_case(&RmadState::WpDisableComplete(Default::default()));
        assert_eq!(reply, GetNextStateCaseReply::next(StateCase::UpdateRoFirmware));
        assert!(!t.device.snapshot().swwp_enabled);
    }
}
