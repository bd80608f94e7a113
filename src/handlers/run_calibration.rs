use tracing::{info, warn};

use super::{
    calibration_map, BaseState, GetNextStateCaseReply, HandlerContext, StateHandler,
    DISABLE_CALIBRATION_MARKER,
};
use crate::error::RmadErrorCode;
use crate::state::{
    CalibrationSetupInstruction, CalibrationStatus, RmadState, RunCalibrationState, StateCase,
};

#[derive(Debug)]
pub struct RunCalibrationStateHandler {
    base: BaseState,
}

impl RunCalibrationStateHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            base: BaseState::new(ctx, StateCase::RunCalibration),
        }
    }

    fn reply(error: RmadErrorCode) -> GetNextStateCaseReply {
        GetNextStateCaseReply::stay(error, StateCase::RunCalibration)
    }
}

impl StateHandler for RunCalibrationStateHandler {
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
        let Some(map) = calibration_map::read(&self.base.ctx.store) else {
            return RmadErrorCode::StateHandlerInitializationFailed;
        };
        let instruction = calibration_map::next_pending_instruction(&map)
            .unwrap_or(CalibrationSetupInstruction::NoNeedCalibration);
        self.base.state = RmadState::RunCalibration(RunCalibrationState {
            instruction,
            components: calibration_map::statuses_for(&map, instruction),
        });
        RmadErrorCode::Ok
    }

    fn get_next_state_case(&mut self, state: &RmadState) -> GetNextStateCaseReply {
        if !matches!(state, RmadState::RunCalibration(_)) {
            return Self::reply(RmadErrorCode::RequestInvalid);
        }
        let ctx = self.base.ctx.clone();
        let Some(mut map) = calibration_map::read(&ctx.store) else {
            return Self::reply(RmadErrorCode::CannotRead);
        };

        let skip_calibration = ctx.marker_exists(DISABLE_CALIBRATION_MARKER);
        let mut failed = false;
        if let Some(instruction) = calibration_map::next_pending_instruction(&map) {
            if let Some(components) = map.get_mut(&instruction) {
                for (component, status) in components.iter_mut().filter(|(_, s)| s.is_pending()) {
                    let ok = skip_calibration || ctx.hardware.components.calibrate(*component);
                    *status = if ok {
                        CalibrationStatus::Complete
                    } else {
                        warn!(component = %component, "Calibration failed");
                        failed = true;
                        CalibrationStatus::Failed
                    };
                }
            }
            info!(
                instruction = ?instruction,
                skipped = %skip_calibration,
                failed = %failed,
                "Calibration round finished"
            );
        }
        if !calibration_map::write(&ctx.store, &map) {
            return Self::reply(RmadErrorCode::CannotWrite);
        }

        if failed {
            GetNextStateCaseReply::next(StateCase::CheckCalibration)
        } else if calibration_map::next_pending_instruction(&map).is_some() {
            GetNextStateCaseReply::next(StateCase::SetupCalibration)
        } else {
            GetNextStateCaseReply::next(StateCase::Finalize)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_utils::TestContext;
    use crate::state::RmadComponent;

    fn prepare(t: &TestContext, replaced: &[RmadComponent]) -> RunCalibrationStateHandler {
        assert!(calibration_map::write(t.store(), &calibration_map::build(replaced)));
        let mut handler = RunCalibrationStateHandler::new(t.ctx.clone());
        assert_eq!(handler.initialize_state(), RmadErrorCode::Ok);
        handler
    }

    fn submit() -> RmadState {
        RmadState::RunCalibration(RunCalibrationState::default())
    }

    #[test]
    fn test_rounds_until_done() {
        let t = TestContext::new();
        let mut handler = prepare(
            &t,
            &[RmadComponent::BaseAccelerometer, RmadComponent::LidAccelerometer],
        );

        assert_eq!(
            handler.get_next_state_case(&submit()),
            GetNextStateCaseReply::next(StateCase::SetupCalibration)
        );
        handler.initialize_state();
        assert_eq!(
            handler.get_next_state_case(&submit()),
            GetNextStateCaseReply::next(StateCase::Finalize)
        );
        assert_eq!(t.device.snapshot().calibration_calls, 2);
    }

    #[test]
    fn test_failure_goes_to_check() {
        let t = TestContext::new();
        t.device.update(|d| {
            d.failing_calibrations.insert(RmadComponent::BaseGyroscope);
        });
        let mut handler = prepare(&t, &[RmadComponent::BaseGyroscope]);

        assert_eq!(
            handler.get_next_state_case(&submit()),
            GetNextStateCaseReply::next(StateCase::CheckCalibration)
        );
        let map = calibration_map::read(t.store()).unwrap();
        assert_eq!(
            calibration_map::statuses(&map)[0].status,
            CalibrationStatus::Failed
        );
    }

    #[test]
    fn test_marker_skips_hardware() {
        let t = TestContext::new();
        t.touch_marker(DISABLE_CALIBRATION_MARKER);
        let mut handler = prepare(&t, &[RmadComponent::LidGyroscope]);

        assert_eq!(
            handler.get_next_state_case(&submit()),
            GetNextStateCaseReply::next(StateCase::Finalize)
        );
        assert_eq!(t.device.snapshot().calibration_calls, 0);
    }
}
