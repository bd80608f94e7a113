use tracing::info;

use super::{BaseState, GetNextStateCaseReply, HandlerContext, StateHandler, DISABLE_POWERWASH_MARKER};
use crate::error::RmadErrorCode;
use crate::metrics::AdditionalActivity;
use crate::state::{RepairCompleteShutdown, RepairCompleteState, RmadState, StateCase};
use crate::store::keys;

/// Final screen; the session ends with a power cycle
#[derive(Debug)]
pub struct RepairCompleteStateHandler {
    base: BaseState,
}

impl RepairCompleteStateHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            base: BaseState::new(ctx, StateCase::RepairComplete),
        }
    }
}

impl StateHandler for RepairCompleteStateHandler {
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
        let ctx = &self.base.ctx;
        let wipe_device = ctx.store.get::<bool>(keys::WIPE_DEVICE).unwrap_or(false);
        let powerwash_required = wipe_device && !ctx.marker_exists(DISABLE_POWERWASH_MARKER);
        self.base.state = RmadState::RepairComplete(RepairCompleteState {
            shutdown: RepairCompleteShutdown::Unknown,
            powerwash_required,
        });
        RmadErrorCode::Ok
    }

    fn get_next_state_case(&mut self, state: &RmadState) -> GetNextStateCaseReply {
        let RmadState::RepairComplete(payload) = state else {
            return GetNextStateCaseReply::stay(RmadErrorCode::RequestInvalid, StateCase::RepairComplete);
        };
        let (error, activity) = match payload.shutdown {
            RepairCompleteShutdown::Unknown => {
                return GetNextStateCaseReply::stay(
                    RmadErrorCode::RequestArgsMissing,
                    StateCase::RepairComplete,
                )
            }
            RepairCompleteShutdown::Reboot => {
                (RmadErrorCode::ExpectReboot, AdditionalActivity::Reboot)
            }
            RepairCompleteShutdown::Shutdown => {
                (RmadErrorCode::ExpectShutdown, AdditionalActivity::Shutdown)
            }
            RepairCompleteShutdown::BatteryCutoff => {
                (RmadErrorCode::ExpectShutdown, AdditionalActivity::BatteryCutoff)
            }
        };
        info!(activity = %activity.symbol(), "Repair complete");
        GetNextStateCaseReply::stay(error, StateCase::RepairComplete).with_activity(activity)
    }
}
