use tracing::info;

use super::{calibration_map, BaseState, GetNextStateCaseReply, HandlerContext, StateHandler};
use crate::error::RmadErrorCode;
use crate::state::{CalibrationStatus, CheckCalibrationState, RmadState, StateCase};

/// Lets the technician retry or skip components whose calibration failed
#[derive(Debug)]
pub struct CheckCalibrationStateHandler {
    base: BaseState,
}

impl CheckCalibrationStateHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            base: BaseState::new(ctx, StateCase::CheckCalibration),
        }
    }

    fn reply(error: RmadErrorCode) -> GetNextStateCaseReply {
        GetNextStateCaseReply::stay(error, StateCase::CheckCalibration)
    }
}

impl StateHandler for CheckCalibrationStateHandler {
    fn base(&self) -> &BaseState {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseState {
        &mut self.base
    }

    fn initialize_state(&mut self) -> RmadErrorCode {
        let Some(map) = calibration_map::read(&self.base.ctx.store) else {
            return RmadErrorCode::StateHandlerInitializationFailed;
        };
        self.base.state = RmadState::CheckCalibration(CheckCalibrationState {
            components: calibration_map::statuses(&map),
        });
        RmadErrorCode::Ok
    }

    fn get_next_state_case(&mut self, state: &RmadState) -> GetNextStateCaseReply {
        let RmadState::CheckCalibration(payload) = state else {
            return Self::reply(RmadErrorCode::RequestInvalid);
        };
        let ctx = self.base.ctx.clone();
        let Some(mut map) = calibration_map::read(&ctx.store) else {
            return Self::reply(RmadErrorCode::CannotRead);
        };

        let mut retry = false;
        for entry in &payload.components {
            let Some(current) = map
                .values_mut()
                .find_map(|components| components.get_mut(&entry.component))
            else {
                return Self::reply(RmadErrorCode::RequestArgsViolation);
            };
            match entry.status {
                CalibrationStatus::Retry if *current == CalibrationStatus::Failed => {
                    retry = true;
                }
                // Only failed components can be sent back for another round.
                CalibrationStatus::Retry => return Self::reply(RmadErrorCode::RequestArgsViolation),
                _ => {}
            }
        }

        for components in map.values_mut() {
            for (component, status) in components.iter_mut() {
                if *status != CalibrationStatus::Failed {
                    continue;
                }
                let retried = payload
                    .components
                    .iter()
                    .any(|e| e.component == *component && e.status == CalibrationStatus::Retry);
                *status = if retried {
                    CalibrationStatus::Retry
                } else if retry {
                    CalibrationStatus::Failed
                } else {
                    CalibrationStatus::Skip
                };
            }
        }
        if !calibration_map::write(&ctx.store, &map) {
            return Self::reply(RmadErrorCode::CannotWrite);
        }

        info!(retry = %retry, "Calibration results reviewed");
        if retry {
            GetNextStateCaseReply::next(StateCase::SetupCalibration)
        } else {
            GetNextStateCaseReply::next(StateCase::Finalize)
        }
    }
}
