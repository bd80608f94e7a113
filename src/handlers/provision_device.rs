use tracing::{error, info};

use super::{calibration_map, BaseState, GetNextStateCaseReply, HandlerContext, StateHandler};
use crate::error::RmadErrorCode;
use crate::state::{
    ProvisionChoice, ProvisionDeviceState, ProvisionStatus, RmadComponent, RmadState, StateCase,
};
use crate::store::keys;

const STATUS_COMPLETE: &str = "complete";
const STATUS_FAILED: &str = "failed";

/// Writes fresh device secrets and decides whether calibration is needed
#[derive(Debug)]
pub struct ProvisionDeviceStateHandler {
    base: BaseState,
}

impl ProvisionDeviceStateHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            base: BaseState::new(ctx, StateCase::ProvisionDevice),
        }
    }

    fn reply(error: RmadErrorCode) -> GetNextStateCaseReply {
        GetNextStateCaseReply::stay(error, StateCase::ProvisionDevice)
    }

    fn replaced_components(&self) -> Vec<RmadComponent> {
        self.base
            .ctx
            .store
            .get::<Vec<String>>(keys::REPLACED_COMPONENT_NAMES)
            .unwrap_or_default()
            .iter()
            .filter_map(|name| RmadComponent::from_name(name))
            .collect()
    }

    fn set_status(&mut self, choice: ProvisionChoice, status: ProvisionStatus) {
        self.base.state = RmadState::ProvisionDevice(ProvisionDeviceState { choice, status });
    }
}

impl StateHandler for ProvisionDeviceStateHandler {
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
        let status = match self
            .base
            .ctx
            .store
            .get::<String>(keys::PROVISION_FINISHED_STATUS)
            .as_deref()
        {
            Some(STATUS_COMPLETE) => ProvisionStatus::Complete,
            Some(STATUS_FAILED) => ProvisionStatus::Failed,
            _ => ProvisionStatus::Unknown,
        };
        self.set_status(ProvisionChoice::Unknown, status);
        RmadErrorCode::Ok
    }

    fn get_next_state_case(&mut self, state: &RmadState) -> GetNextStateCaseReply {
        let RmadState::ProvisionDevice(payload) = state else {
            return Self::reply(RmadErrorCode::RequestInvalid);
        };
        if payload.choice == ProvisionChoice::Unknown {
            return Self::reply(RmadErrorCode::RequestArgsMissing);
        }

        let ctx = self.base.ctx.clone();
        let store = &ctx.store;
        let replaced = self.replaced_components();
        let already_done =
            store.get::<String>(keys::PROVISION_FINISHED_STATUS).as_deref() == Some(STATUS_COMPLETE);

        // A completed provisioning is not redone by a repeated Continue.
        if !already_done || payload.choice == ProvisionChoice::Retry {
            if !ctx.hardware.components.provision(&replaced) {
                error!("Device provisioning failed");
                self.set_status(payload.choice, ProvisionStatus::Failed);
                store.set(keys::PROVISION_FINISHED_STATUS, STATUS_FAILED.to_string());
                return Self::reply(RmadErrorCode::ProvisioningFailed);
            }
            let map = calibration_map::build(&replaced);
            if !calibration_map::write(store, &map)
                || !store.set(keys::PROVISION_FINISHED_STATUS, STATUS_COMPLETE.to_string())
            {
                return Self::reply(RmadErrorCode::CannotWrite);
            }
            info!(replaced = ?replaced, "Device provisioned");
        }
        self.set_status(payload.choice, ProvisionStatus::Complete);

        let Some(map) = calibration_map::read(store) else {
            return Self::reply(RmadErrorCode::CannotRead);
        };
        if calibration_map::next_pending_instruction(&map).is_some() {
            GetNextStateCaseReply::next(StateCase::SetupCalibration)
        } else {
            GetNextStateCaseReply::next(StateCase::Finalize)
        }
    }
}
