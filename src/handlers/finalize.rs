use tracing::{error, info};

use super::{BaseState, GetNextStateCaseReply, HandlerContext, StateHandler};
use crate::error::RmadErrorCode;
use crate::state::{FinalizeChoice, FinalizeState, FinalizeStatus, RmadState, StateCase};

/// Locks the device back down once all repair steps are done
#[derive(Debug)]
pub struct FinalizeStateHandler {
    base: BaseState,
}

impl FinalizeStateHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            base: BaseState::new(ctx, StateCase::Finalize),
        }
    }
}

impl StateHandler for FinalizeStateHandler {
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
        self.retrieve_state();
        RmadErrorCode::Ok
    }

    fn get_next_state_case(&mut self, state: &RmadState) -> GetNextStateCaseReply {
        let RmadState::Finalize(payload) = state else {
            return GetNextStateCaseReply::stay(RmadErrorCode::RequestInvalid, StateCase::Finalize);
        };
        if payload.choice == FinalizeChoice::Unknown {
            return GetNextStateCaseReply::stay(RmadErrorCode::RequestArgsMissing, StateCase::Finalize);
        }

        let ctx = self.base.ctx.clone();
        let finalized = ctx.hardware.firmware.finalize();
        self.base.state = RmadState::Finalize(FinalizeState {
            choice: payload.choice,
            status: if finalized {
                FinalizeStatus::Complete
            } else {
                FinalizeStatus::Failed
            },
        });
        if !self.store_state() {
            return GetNextStateCaseReply::stay(RmadErrorCode::CannotWrite, StateCase::Finalize);
        }
        if !finalized {
            error!("Finalization failed");
            return GetNextStateCaseReply::stay(RmadErrorCode::FinalizationFailed, StateCase::Finalize);
        }

        info!("Device finalized");
        if ctx.hwwp_enabled() {
            GetNextStateCaseReply::next(StateCase::RepairComplete)
        } else {
            GetNextStateCaseReply::next(StateCase::WpEnablePhysical)
        }
    }
}
