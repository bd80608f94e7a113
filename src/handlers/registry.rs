use std::collections::HashMap;
use tracing::debug;

use super::check_calibration::CheckCalibrationStateHandler;
use super::components_repair::ComponentsRepairStateHandler;
use super::device_destination::DeviceDestinationStateHandler;
use super::finalize::FinalizeStateHandler;
use super::provision_device::ProvisionDeviceStateHandler;
use super::repair_complete::RepairCompleteStateHandler;
use super::restock::RestockStateHandler;
use super::run_calibration::RunCalibrationStateHandler;
use super::setup_calibration::SetupCalibrationStateHandler;
use super::update_device_info::UpdateDeviceInfoStateHandler;
use super::update_ro_firmware::UpdateRoFirmwareStateHandler;
use super::welcome::WelcomeStateHandler;
use super::wipe_selection::WipeSelectionStateHandler;
use super::wp_disable_complete::WpDisableCompleteStateHandler;
use super::wp_disable_method::WpDisableMethodStateHandler;
use super::wp_disable_physical::WpDisablePhysicalStateHandler;
use super::wp_disable_rsu::WpDisableRsuStateHandler;
use super::wp_enable_physical::WpEnablePhysicalStateHandler;
use super::{HandlerContext, StateHandler};
use crate::state::StateCase;

/// Fixed lookup table from state id to its handler, built once at startup
pub struct StateHandlerRegistry {
    handlers: HashMap<StateCase, Box<dyn StateHandler>>,
}

impl StateHandlerRegistry {
    pub fn new(ctx: HandlerContext) -> Self {
        let handlers: Vec<Box<dyn StateHandler>> = vec![
            Box::new(WelcomeStateHandler::new(ctx.clone())),
            Box::new(ComponentsRepairStateHandler::new(ctx.clone())),
            Box::new(DeviceDestinationStateHandler::new(ctx.clone())),
            Box::new(WipeSelectionStateHandler::new(ctx.clone())),
            Box::new(WpDisableMethodStateHandler::new(ctx.clone())),
            Box::new(WpDisableRsuStateHandler::new(ctx.clone())),
            Box::new(WpDisablePhysicalStateHandler::new(ctx.clone())),
            Box::new(WpDisableCompleteStateHandler::new(ctx.clone())),
            Box::new(UpdateRoFirmwareStateHandler::new(ctx.clone())),
            Box::new(RestockStateHandler::new(ctx.clone())),
            Box::new(UpdateDeviceInfoStateHandler::new(ctx.clone())),
            Box::new(ProvisionDeviceStateHandler::new(ctx.clone())),
            Box::new(SetupCalibrationStateHandler::new(ctx.clone())),
            Box::new(RunCalibrationStateHandler::new(ctx.clone())),
            Box::new(CheckCalibrationStateHandler::new(ctx.clone())),
            Box::new(FinalizeStateHandler::new(ctx.clone())),
            Box::new(WpEnablePhysicalStateHandler::new(ctx.clone())),
            Box::new(RepairCompleteStateHandler::new(ctx)),
        ];

        let mut registry = Self {
            handlers: HashMap::with_capacity(handlers.len()),
        };
        for handler in handlers {
            registry.register(handler);
        }
        debug!(count = registry.handlers.len(), "State handlers registered");
        registry
    }

    fn register(&mut self, handler: Box<dyn StateHandler>) {
        self.handlers.insert(handler.state_case(), handler);
    }

    pub fn get_handler(&self, state_case: StateCase) -> Option<&dyn StateHandler> {
        self.handlers.get(&state_case).map(|h| h.as_ref())
    }

    pub fn get_handler_mut(&mut self, state_case: StateCase) -> Option<&mut (dyn StateHandler + 'static)> {
        self.handlers.get_mut(&state_case).map(|h| h.as_mut())
    }

    pub fn contains(&self, state_case: StateCase) -> bool {
        self.handlers.contains_key(&state_case)
    }
}

impl std::fmt::Debug for StateHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut states: Vec<_> = self.handlers.keys().collect();
        states.sort();
        f.debug_struct("StateHandlerRegistry")
            .field("states", &states)
            .finish()
    }
}
