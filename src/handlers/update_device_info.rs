use tracing::{error, info, warn};

use super::{BaseState, GetNextStateCaseReply, HandlerContext, StateHandler};
use crate::error::RmadErrorCode;
use crate::hardware::DeviceInfo;
use crate::state::{RmadState, StateCase, UpdateDeviceInfoState};
use crate::store::keys;

/// Rewrites serial number, region, SKU and custom label into VPD/CBI
#[derive(Debug)]
pub struct UpdateDeviceInfoStateHandler {
    base: BaseState,
}

impl UpdateDeviceInfoStateHandler {
    pub fn new(ctx: HandlerContext) -> Self {
        Self {
            base: BaseState::new(ctx, StateCase::UpdateDeviceInfo),
        }
    }

    fn reply(error: RmadErrorCode) -> GetNextStateCaseReply {
        GetNextStateCaseReply::stay(error, StateCase::UpdateDeviceInfo)
    }

    fn fresh_state(&self) -> Option<UpdateDeviceInfoState> {
        let hardware = &self.base.ctx.hardware;
        let info = hardware.device_info.read_device_info()?;
        let region_list = hardware.device_info.region_list();
        let sku_list = hardware.device_info.sku_list();
        let custom_label_list = hardware.device_info.custom_label_list();

        let region_index = region_list.iter().position(|r| *r == info.region);
        let sku_index = info.sku.and_then(|sku| sku_list.iter().position(|s| *s == sku));
        let custom_label_index = custom_label_list
            .iter()
            .position(|l| *l == info.custom_label);

        Some(UpdateDeviceInfoState {
            original_serial_number: info.serial_number.clone(),
            original_region_index: region_index,
            original_sku_index: sku_index,
            original_custom_label_index: custom_label_index,
            original_dram_part_number: info.dram_part_number.clone(),
            region_list,
            sku_list,
            custom_label_list,
            serial_number: info.serial_number,
            region_index,
            sku_index,
            custom_label_index,
            dram_part_number: info.dram_part_number,
            mlb_repair: self.base.ctx.store.get::<bool>(keys::MLB_REPAIR).unwrap_or(false),
        })
    }
}

fn index_in_range(index: Option<usize>, len: usize) -> bool {
    index.map_or(true, |i| i < len)
}

/// Stored indices come from a file that may be corrupt; never index with them unchecked.
fn stored_indices_valid(state: &UpdateDeviceInfoState) -> bool {
    index_in_range(state.original_region_index, state.region_list.len())
        && index_in_range(state.original_sku_index, state.sku_list.len())
        && index_in_range(state.original_custom_label_index, state.custom_label_list.len())
        && index_in_range(state.region_index, state.region_list.len())
        && index_in_range(state.sku_index, state.sku_list.len())
        && index_in_range(state.custom_label_index, state.custom_label_list.len())
}

impl StateHandler for UpdateDeviceInfoStateHandler {
    fn base(&self) -> &BaseState {
        &self.base
    }

    fn base_mut(&mut self) -> &mut BaseState {
        &mut self.base
    }

    fn initialize_state(&mut self) -> RmadErrorCode {
        if self.retrieve_state() {
            let RmadState::UpdateDeviceInfo(stored) = &self.base.state else {
                return RmadErrorCode::StateHandlerInitializationFailed;
            };
            if !stored_indices_valid(stored) {
                warn!("Stored device info indices are out of range");
                return RmadErrorCode::StateHandlerInitializationFailed;
            }
            return RmadErrorCode::Ok;
        }

        let Some(state) = self.fresh_state() else {
            error!("Cannot read device info");
            return RmadErrorCode::StateHandlerInitializationFailed;
        };
        self.base.state = RmadState::UpdateDeviceInfo(state);
        if !self.store_state() {
            return RmadErrorCode::CannotWrite;
        }
        RmadErrorCode::Ok
    }

    fn get_next_state_case(&mut self, state: &RmadState) -> GetNextStateCaseReply {
        let RmadState::UpdateDeviceInfo(payload) = state else {
            return Self::reply(RmadErrorCode::RequestInvalid);
        };
        let RmadState::UpdateDeviceInfo(current) = &self.base.state else {
            return Self::reply(RmadErrorCode::TransitionFailed);
        };

        if payload.serial_number.is_empty() {
            return Self::reply(RmadErrorCode::RequestArgsMissing);
        }
        let Some(region_index) = payload.region_index else {
            return Self::reply(RmadErrorCode::RequestArgsMissing);
        };
        if payload.sku_index.is_none() && !current.sku_list.is_empty() {
            return Self::reply(RmadErrorCode::RequestArgsMissing);
        }
        // Lists are owned by the device; the caller only picks indices.
        let Some(region) = current.region_list.get(region_index).cloned() else {
            return Self::reply(RmadErrorCode::RequestArgsViolation);
        };
        let sku = match payload.sku_index {
            Some(i) => match current.sku_list.get(i) {
                Some(sku) => Some(*sku),
                None => return Self::reply(RmadErrorCode::RequestArgsViolation),
            },
            None => None,
        };
        let custom_label = match payload.custom_label_index {
            Some(i) => match current.custom_label_list.get(i) {
                Some(label) => label.clone(),
                None => return Self::reply(RmadErrorCode::RequestArgsViolation),
            },
            None => String::new(),
        };

        let info = DeviceInfo {
            serial_number: payload.serial_number.clone(),
            region,
            sku,
            custom_label,
            dram_part_number: payload.dram_part_number.clone(),
        };
        if !self.base.ctx.hardware.device_info.write_device_info(&info) {
            error!("Failed to write device info");
            return Self::reply(RmadErrorCode::CannotWrite);
        }

        let mut updated = current.clone();
        updated.serial_number = payload.serial_number.clone();
        updated.region_index = payload.region_index;
        updated.sku_index = payload.sku_index;
        updated.custom_label_index = payload.custom_label_index;
        updated.dram_part_number = payload.dram_part_number.clone();
        self.base.state = RmadState::UpdateDeviceInfo(updated);
        if !self.store_state() {
            return Self::reply(RmadErrorCode::CannotWrite);
        }

        info!(serial_number = %info.serial_number, region = %info.region, sku = ?info.sku, "Device info updated");
        GetNextStateCaseReply::next(StateCase::ProvisionDevice)
    }
}
