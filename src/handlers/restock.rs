use tracing::warn;

use super::{BaseState, GetNextStateCaseReply, HandlerContext, StateHandler};
use crate::error::RmadErrorCode;
use crate::logs;
use crate::metrics::AdditionalActivity;
use crate::state::{RestockChoice, RmadState, StateCase};

/// Devices going to a new owner may be shelved before the remaining steps
#[derive(Debug)]
pub struct RestockStateHandler {
    base: BaseState,
}

impl RestockStateHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            base: BaseState::new(ctx, StateCase::Restock),
        }
    }
}

impl StateHandler for RestockStateHandler {
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
        let RmadState::Restock(payload) = state else {
            return GetNextStateCaseReply::stay(RmadErrorCode::RequestInvalid, StateCase::Restock);
        };
        let ctx = &self.base.ctx;
        match payload.choice {
            RestockChoice::Unknown => {
                GetNextStateCaseReply::stay(RmadErrorCode::RequestArgsMissing, StateCase::Restock)
            }
            RestockChoice::Continue => {
                if !logs::record_restock_option(&ctx.store, ctx.now(), false) {
                    warn!("Failed to record restock option event");
                }
                GetNextStateCaseReply::next(StateCase::UpdateDeviceInfo)
            }
            // The workflow resumes in UpdateDeviceInfo after the device is powered on again.
            RestockChoice::Shutdown => {
                if !logs::record_restock_option(&ctx.store, ctx.now(), true) {
                    warn!("Failed to record restock option event");
                }
                GetNextStateCaseReply::stay(RmadErrorCode::ExpectShutdown, StateCase::UpdateDeviceInfo)
                    .with_activity(AdditionalActivity::Shutdown)
            }
        }
    }
}
