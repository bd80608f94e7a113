use tracing::info;

use super::{BaseState, GetNextStateCaseReply, HandlerContext, StateHandler};
use crate::error::RmadErrorCode;
use crate::state::{RmadState, StateCase, WelcomeChoice};

/// Entry point of every RMA session
#[derive(Debug)]
pub struct WelcomeStateHandler {
    base: BaseState,
}

impl WelcomeStateHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            base: BaseState::new(ctx, StateCase::Welcome),
        }
    }
}

impl StateHandler for WelcomeStateHandler {
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
        self.retrieve_state();
        RmadErrorCode::Ok
    }

    fn get_next_state_case(&mut self, state: &RmadState) -> GetNextStateCaseReply {
        let RmadState::Welcome(payload) = state else {
            return GetNextStateCaseReply::stay(RmadErrorCode::RequestInvalid, StateCase::Welcome);
        };

        match payload.choice {
            WelcomeChoice::Unknown => {
                GetNextStateCaseReply::stay(RmadErrorCode::RequestArgsMissing, StateCase::Welcome)
            }
            // Leaving the flow goes through AbortRma, not through a transition.
            WelcomeChoice::Cancel => {
                GetNextStateCaseReply::stay(RmadErrorCode::RequestArgsViolation, StateCase::Welcome)
            }
            WelcomeChoice::FinalizeRepair => {
                self.base.state = state.clone();
                if !self.store_state() {
                    return GetNextStateCaseReply::stay(RmadErrorCode::CannotWrite, StateCase::Welcome);
                }
                info!("Technician started the repair flow");
                GetNextStateCaseReply::next(StateCase::ComponentsRepair)
            }
        }
    }
}
