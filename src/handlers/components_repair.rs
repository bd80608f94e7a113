use serde_json::json;
use std::collections::HashSet;
use tracing::{info, warn};

use super::{BaseState, GetNextStateCaseReply, HandlerContext, StateHandler};
use crate::error::RmadErrorCode;
use crate::logs;
use crate::metrics::{keys as metrics_keys, utils as metrics_utils};
use crate::state::{
    ComponentRepairStatus, ComponentsRepairState, RepairStatus, RmadComponent, RmadState,
    StateCase,
};
use crate::store::keys;

/// Technician reports which components were replaced
#[derive(Debug)]
pub struct ComponentsRepairStateHandler {
    base: BaseState,
    probed: Vec<RmadComponent>,
}

impl ComponentsRepairStateHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            base: BaseState::new(ctx, StateCase::ComponentsRepair),
            probed: Vec::new(),
        }
    }

    fn reply(error: RmadErrorCode) -> GetNextStateCaseReply {
        GetNextStateCaseReply::stay(error, StateCase::ComponentsRepair)
    }

    fn validate(&self, payload: &ComponentsRepairState) -> Result<(), RmadErrorCode> {
        let mut seen = HashSet::new();
        for entry in &payload.components {
            if entry.repair_status == RepairStatus::Unknown {
                return Err(RmadErrorCode::RequestArgsMissing);
            }
            if !seen.insert(entry.component) {
                return Err(RmadErrorCode::RequestArgsViolation);
            }
            let probed = self.probed.contains(&entry.component);
            // Only components that were not found can be reported missing.
            if probed == (entry.repair_status == RepairStatus::Missing) {
                warn!(
                    component = %entry.component,
                    status = ?entry.repair_status,
                    probed = %probed,
                    "Repair status contradicts probe result"
                );
                return Err(RmadErrorCode::RequestArgsViolation);
            }
        }
        if !payload.mainboard_rework && self.probed.iter().any(|c| !seen.contains(c)) {
            return Err(RmadErrorCode::RequestArgsMissing);
        }
        Ok(())
    }
}

impl StateHandler for ComponentsRepairStateHandler {
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
        self.probed = self.base.ctx.hardware.components.probe_components();
        self.retrieve_state();

        let RmadState::ComponentsRepair(current) = &self.base.state else {
            return RmadErrorCode::StateHandlerInitializationFailed;
        };
        let previous = current.clone();
        let mut components: Vec<ComponentRepairStatus> = self
            .probed
            .iter()
            .map(|component| ComponentRepairStatus {
                component: *component,
                repair_status: previous
                    .components
                    .iter()
                    .find(|c| c.component == *component)
                    .map(|c| c.repair_status)
                    .unwrap_or_default(),
            })
            .collect();
        components.extend(
            previous
                .components
                .iter()
                .filter(|c| c.repair_status == RepairStatus::Missing && !self.probed.contains(&c.component))
                .cloned(),
        );

        self.base.state = RmadState::ComponentsRepair(ComponentsRepairState {
            components,
            mainboard_rework: previous.mainboard_rework,
        });
        RmadErrorCode::Ok
    }

    fn get_next_state_case(&mut self, state: &RmadState) -> GetNextStateCaseReply {
        let RmadState::ComponentsRepair(payload) = state else {
            return Self::reply(RmadErrorCode::RequestInvalid);
        };
        if let Err(error) = self.validate(payload) {
            return Self::reply(error);
        }

        let ctx = self.base.ctx.clone();
        let store = &ctx.store;
        let now = ctx.now();

        self.base.state = state.clone();
        if !self.store_state() {
            return Self::reply(RmadErrorCode::CannotWrite);
        }

        let replaced: Vec<RmadComponent> = if payload.mainboard_rework {
            self.probed.clone()
        } else {
            payload
                .components
                .iter()
                .filter(|c| c.repair_status == RepairStatus::Replaced)
                .map(|c| c.component)
                .collect()
        };
        let replaced_names: Vec<&str> = replaced.iter().map(|c| c.name()).collect();

        let mut updates = vec![
            (keys::MLB_REPAIR.to_string(), json!(payload.mainboard_rework)),
            (keys::REPLACED_COMPONENT_NAMES.to_string(), json!(replaced_names)),
        ];
        let mut ccd_blocked = false;
        if payload.mainboard_rework {
            // A reworked mainboard has no trustworthy data left.
            ccd_blocked = ctx.hardware.gsc.ccd_blocked();
            updates.push((keys::SAME_OWNER.to_string(), json!(false)));
            updates.push((keys::WP_DISABLE_REQUIRED.to_string(), json!(true)));
            updates.push((keys::WIPE_DEVICE.to_string(), json!(true)));
            updates.push((keys::CCD_BLOCKED.to_string(), json!(ccd_blocked)));
        }
        if !store.set_values(updates)
            || !metrics_utils::set_metrics_value(
                store,
                metrics_keys::REPLACED_COMPONENT_NAMES,
                &replaced_names,
            )
        {
            return Self::reply(RmadErrorCode::CannotWrite);
        }
        if !logs::record_selected_components(store, now, &replaced) {
            warn!("Failed to record selected components event");
        }

        info!(
            replaced = ?replaced_names,
            mainboard_rework = %payload.mainboard_rework,
            "Recorded component repair status"
        );

        if !payload.mainboard_rework {
            GetNextStateCaseReply::next(StateCase::DeviceDestination)
        } else if ccd_blocked {
            GetNextStateCaseReply::next(StateCase::WpDisableRsu)
        } else {
            GetNextStateCaseReply::next(StateCase::WpDisableMethod)
        }
    }

    fn cleanup_state(&mut self) {
        self.probed.clear();
    }
}
