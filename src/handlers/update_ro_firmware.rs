use tracing::{error, info};

use super::{BaseState, GetNextStateCaseReply, HandlerContext, StateHandler};
use crate::error::RmadErrorCode;
use crate::metrics::{keys as metrics_keys, utils as metrics_utils, AdditionalActivity};
use crate::state::{RmadState, StateCase, UpdateRoFirmwareChoice, UpdateRoFirmwareState};
use crate::store::keys;

#[derive(Debug)]
pub struct UpdateRoFirmwareStateHandler {
    base: BaseState,
}

impl UpdateRoFirmwareStateHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            base: BaseState::new(ctx, StateCase::UpdateRoFirmware),
        }
    }

    fn reply(error: RmadErrorCode) -> GetNextStateCaseReply {
        GetNextStateCaseReply::stay(error, StateCase::UpdateRoFirmware)
    }

    fn next_state(&self) -> StateCase {
        if self.base.ctx.store.get::<bool>(keys::SAME_OWNER) == Some(false) {
            StateCase::Restock
        } else {
            StateCase::UpdateDeviceInfo
        }
    }
}

impl StateHandler for UpdateRoFirmwareStateHandler {
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
        let ctx = self.base.ctx.clone();
        if ctx.store.get::<bool>(keys::SAME_OWNER).is_none() {
            return RmadErrorCode::StateHandlerInitializationFailed;
        }
        let ro_verified = ctx.hardware.firmware.ro_verified();
        if !metrics_utils::set_metrics_value(&ctx.store, metrics_keys::RO_FIRMWARE_VERIFIED, &ro_verified) {
            return RmadErrorCode::CannotWrite;
        }
        self.base.state = RmadState::UpdateRoFirmware(UpdateRoFirmwareState {
            choice: UpdateRoFirmwareChoice::Unknown,
            optional: ro_verified,
        });
        RmadErrorCode::Ok
    }

    fn get_next_state_case(&mut self, state: &RmadState) -> GetNextStateCaseReply {
        let RmadState::UpdateRoFirmware(payload) = state else {
            return Self::reply(RmadErrorCode::RequestInvalid);
        };
        let optional = matches!(
            &self.base.state,
            RmadState::UpdateRoFirmware(UpdateRoFirmwareState { optional: true, .. })
        );

        match payload.choice {
            UpdateRoFirmwareChoice::Unknown => Self::reply(RmadErrorCode::RequestArgsMissing),
            UpdateRoFirmwareChoice::Skip if !optional => {
                Self::reply(RmadErrorCode::RequestArgsViolation)
            }
            UpdateRoFirmwareChoice::Skip => GetNextStateCaseReply::next(self.next_state()),
            UpdateRoFirmwareChoice::Update => {
                let ctx = self.base.ctx.clone();
                if !ctx.hardware.firmware.update_ro_firmware() {
                    error!("RO firmware update failed");
                    return Self::reply(RmadErrorCode::UpdateRoFirmwareFailed);
                }
                if !ctx.store.set(keys::FIRMWARE_UPDATED, true) {
                    return Self::reply(RmadErrorCode::CannotWrite);
                }
                info!("RO firmware updated");
                GetNextStateCaseReply::next(self.next_state())
                    .with_activity(AdditionalActivity::Reboot)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_utils::TestContext;

    fn choose(choice: UpdateRoFirmwareChoice) -> RmadState {
        RmadState::UpdateRoFirmware(UpdateRoFirmwareState {
            choice,
            optional: false,
        })
    }

    #[test]
    fn test_skip_requires_verified_firmware() {
        let t = TestContext::new();
        t.device.update(|d| d.ro_verified = false);
        assert!(t.store().set(keys::SAME_OWNER, true));
        let mut handler = UpdateRoFirmwareStateHandler::new(t.ctx.clone());
        assert_eq!(handler.initialize_state(), RmadErrorCode::Ok);
        assert_eq!(metrics_utils::snapshot(t.store()).ro_firmware_verified, Some(false));

        assert_eq!(
            handler.get_next_state_case(&choose(UpdateRoFirmwareChoice::Skip)).error,
            RmadErrorCode::RequestArgsViolation
        );
    }

    #[test]
    fn test_update_reboots_into_next_state() {
        let t = TestContext::new();
        assert!(t.store().set(keys::SAME_OWNER, false));
        let mut handler = UpdateRoFirmwareStateHandler::new(t.ctx.clone());
        handler.initialize_state();

        let reply = handler.get_next_state_case(&choose(UpdateRoFirmwareChoice::Update));
        assert_eq!(reply.error, RmadErrorCode::Ok);
        assert_eq!(reply.state_case, StateCase::Restock);
        assert_eq!(reply.additional_activity, AdditionalActivity::Reboot);
        assert_eq!(t.store().get::<bool>(keys::FIRMWARE_UPDATED), Some(true));
        assert_eq!(t.device.snapshot().firmware_updates, 1);
    }

    #[test]
    fn test_update_failure() {
        let t = TestContext::new();
        t.device.update(|d| d.firmware_update_succeeds = false);
        assert!(t.store().set(keys::SAME_OWNER, true));
        let mut handler = UpdateRoFirmwareStateHandler::new(t.ctx.clone());
        handler.initialize_state();

        let reply = handler.get_next_state_case(&choose(UpdateRoFirmwareChoice::Update));
        assert_eq!(reply.error, RmadErrorCode::UpdateRoFirmwareFailed);
        assert_eq!(reply.state_case, StateCase::UpdateRoFirmware);

        t.device.update(|d| d.firmware_update_succeeds = true);
        let reply = handler.get_next_state_case(&choose(UpdateRoFirmwareChoice::Skip));
        assert_eq!(reply, GetNextStateCaseReply::next(StateCase::UpdateDeviceInfo));
    }
}
