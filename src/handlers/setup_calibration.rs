use super::{calibration_map, BaseState, GetNextStateCaseReply, HandlerContext, StateHandler};
use crate::error::RmadErrorCode;
use crate::state::{CalibrationSetupInstruction, RmadState, SetupCalibrationState, StateCase};

/// Tells the technician how to position the device for the next calibration round
#[derive(Debug)]
pub struct SetupCalibrationStateHandler {
    base: BaseState,
}

impl SetupCalibrationStateHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            base: BaseState::new(ctx, StateCase::SetupCalibration),
        }
    }

    fn pending_instruction(&self) -> Option<CalibrationSetupInstruction> {
        calibration_map::read(&self.base.ctx.store)
            .and_then(|map| calibration_map::next_pending_instruction(&map))
    }
}

impl StateHandler for SetupCalibrationStateHandler {
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
        let instruction = calibration_map::next_pending_instruction(&map)
            .unwrap_or(CalibrationSetupInstruction::NoNeedCalibration);
        self.base.state = RmadState::SetupCalibration(SetupCalibrationState { instruction });
        RmadErrorCode::Ok
    }

    fn get_next_state_case(&mut self, state: &RmadState) -> GetNextStateCaseReply {
        if !matches!(state, RmadState::SetupCalibration(_)) {
            return GetNextStateCaseReply::stay(
                RmadErrorCode::RequestInvalid,
                StateCase::SetupCalibration,
            );
        }
        match self.pending_instruction() {
            Some(_) => GetNextStateCaseReply::next(StateCase::RunCalibration),
            None => GetNextStateCaseReply::next(StateCase::Finalize),
        }
    }
}
