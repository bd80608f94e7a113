use tracing::debug;

use super::{BaseState, GetNextStateCaseReply, HandlerContext, StateHandler};
use crate::error::RmadErrorCode;
use crate::state::{RmadState, StateCase};

/// Waits for the technician to close the device and restore the write protect switch
#[derive(Debug)]
pub struct WpEnablePhysicalStateHandler {
    base: BaseState,
}

impl WpEnablePhysicalStateHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            base: BaseState::new(ctx, StateCase::WpEnablePhysical),
        }
    }
}

impl StateHandler for WpEnablePhysicalStateHandler {
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
        RmadErrorCode::Ok
    }

    fn get_next_state_case(&mut self, state: &RmadState) -> GetNextStateCaseReply {
        if !matches!(state, RmadState::WpEnablePhysical(_)) {
            return GetNextStateCaseReply::stay(
                RmadErrorCode::RequestInvalid,
                StateCase::WpEnablePhysical,
            );
        }
        if self.base.ctx.hardware.write_protect.hardware_wp_enabled() == Some(true) {
            GetNextStateCaseReply::next(StateCase::RepairComplete)
        } else {
            debug!("Waiting for hardware write protect to be enabled");
            GetNextStateCaseReply::stay(RmadErrorCode::Wait, StateCase::WpEnablePhysical)
        }
    }
}
