use serde_json::json;
use tracing::{info, warn};

use super::{wp_method, BaseState, GetNextStateCaseReply, HandlerContext, StateHandler};
use crate::error::RmadErrorCode;
use crate::logs;
use crate::metrics::{keys as metrics_keys, utils as metrics_utils};
use crate::state::{Destination, RmadComponent, RmadState, StateCase};
use crate::store::keys;

/// Whether the device goes back to its owner decides how much must be unlocked
#[derive(Debug)]
pub struct DeviceDestinationStateHandler {
    base: BaseState,
}

impl DeviceDestinationStateHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            base: BaseState::new(ctx, StateCase::DeviceDestination),
        }
    }

    fn reply(error: RmadErrorCode) -> GetNextStateCaseReply {
        GetNextStateCaseReply::stay(error, StateCase::DeviceDestination)
    }

    fn replaced_components_need_wp_disable(&self) -> bool {
        self.base
            .ctx
            .store
            .get::<Vec<String>>(keys::REPLACED_COMPONENT_NAMES)
            .unwrap_or_default()
            .iter()
            .filter_map(|name| RmadComponent::from_name(name))
            .any(|component| component.requires_wp_disable())
    }
}

impl StateHandler for DeviceDestinationStateHandler {
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
        let RmadState::DeviceDestination(payload) = state else {
            return Self::reply(RmadErrorCode::RequestInvalid);
        };
        let same_owner = match payload.destination {
            Destination::Unknown => return Self::reply(RmadErrorCode::RequestArgsMissing),
            Destination::Same => true,
            Destination::Different => false,
        };

        self.base.state = state.clone();
        if !self.store_state() {
            return Self::reply(RmadErrorCode::CannotWrite);
        }

        let ctx = self.base.ctx.clone();
        let store = &ctx.store;
        let wp_disable_required = !same_owner || self.replaced_components_need_wp_disable();
        let ccd_blocked = ctx.hardware.gsc.ccd_blocked();

        let mut updates = vec![
            (keys::SAME_OWNER.to_string(), json!(same_owner)),
            (keys::WP_DISABLE_REQUIRED.to_string(), json!(wp_disable_required)),
            (keys::CCD_BLOCKED.to_string(), json!(ccd_blocked)),
        ];
        let hwwp_enabled = ctx.hwwp_enabled();
        let skip_wp_disable = wp_disable_required && !hwwp_enabled;
        if skip_wp_disable {
            updates.push((keys::WP_DISABLE_SKIPPED.to_string(), json!(true)));
            updates.push((keys::WIPE_DEVICE.to_string(), json!(!same_owner)));
            updates.push((keys::WP_DISABLE_METHOD.to_string(), json!(wp_method::SKIPPED)));
        } else if wp_disable_required && !same_owner {
            updates.push((keys::WIPE_DEVICE.to_string(), json!(true)));
        }
        if !store.set_values(updates) {
            return Self::reply(RmadErrorCode::CannotWrite);
        }
        if skip_wp_disable
            && !metrics_utils::set_metrics_value(
                store,
                metrics_keys::WP_DISABLE_METHOD,
                &wp_method::SKIPPED,
            )
        {
            return Self::reply(RmadErrorCode::CannotWrite);
        }
        if !logs::record_device_destination(store, ctx.now(), same_owner) {
            warn!("Failed to record device destination event");
        }

        info!(
            same_owner = %same_owner,
            wp_disable_required = %wp_disable_required,
            ccd_blocked = %ccd_blocked,
            hwwp_enabled = %hwwp_enabled,
            "Device destination selected"
        );

        let next = if !wp_disable_required {
            StateCase::Finalize
        } else if skip_wp_disable {
            StateCase::WpDisableComplete
        } else if same_owner {
            StateCase::WipeSelection
        } else if ccd_blocked {
            StateCase::WpDisableRsu
        } else {
            StateCase::WpDisableMethod
        };
        GetNextStateCaseReply::next(next)
    }
}
