//! Workflow state identifiers and their payloads

pub mod component;
pub mod payloads;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use component::{
    CalibrationComponentStatus, CalibrationSetupInstruction, CalibrationStatus,
    ComponentRepairStatus, RepairStatus, RmadComponent,
};
pub use payloads::*;

/// Identifier of a workflow state, persisted as its integer value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateCase {
    NotSet,
    Welcome,
    ComponentsRepair,
    DeviceDestination,
    WpDisableMethod,
    WpDisableRsu,
    WpDisablePhysical,
    WpDisableComplete,
    UpdateRoFirmware,
    Restock,
    UpdateDeviceInfo,
    CheckCalibration,
    SetupCalibration,
    RunCalibration,
    ProvisionDevice,
    WpEnablePhysical,
    Finalize,
    RepairComplete,
    WipeSelection,
}

impl StateCase {
    /// Every real state, in id order; `NotSet` is excluded
    pub const ALL: [StateCase; 18] = [
        StateCase::Welcome,
        StateCase::ComponentsRepair,
        StateCase::DeviceDestination,
        StateCase::WpDisableMethod,
        StateCase::WpDisableRsu,
        StateCase::WpDisablePhysical,
        StateCase::WpDisableComplete,
        StateCase::UpdateRoFirmware,
        StateCase::Restock,
        StateCase::UpdateDeviceInfo,
        StateCase::CheckCalibration,
        StateCase::SetupCalibration,
        StateCase::RunCalibration,
        StateCase::ProvisionDevice,
        StateCase::WpEnablePhysical,
        StateCase::Finalize,
        StateCase::RepairComplete,
        StateCase::WipeSelection,
    ];

    pub fn as_i32(&self) -> i32 {
        match self {
            StateCase::NotSet => 0,
            StateCase::Welcome => 1,
            StateCase::ComponentsRepair => 2,
            StateCase::DeviceDestination => 3,
            StateCase::WpDisableMethod => 4,
            StateCase::WpDisableRsu => 5,
            StateCase::WpDisablePhysical => 6,
            StateCase::WpDisableComplete => 7,
            StateCase::UpdateRoFirmware => 8,
            StateCase::Restock => 9,
            StateCase::UpdateDeviceInfo => 10,
            StateCase::CheckCalibration => 11,
            StateCase::SetupCalibration => 12,
            StateCase::RunCalibration => 13,
            StateCase::ProvisionDevice => 14,
            StateCase::WpEnablePhysical => 15,
            StateCase::Finalize => 16,
            StateCase::RepairComplete => 17,
            StateCase::WipeSelection => 18,
        }
    }

    pub fn from_i32(value: i32) -> Option<Self> {
        if value == 0 {
            return Some(StateCase::NotSet);
        }
        Self::ALL.into_iter().find(|s| s.as_i32() == value)
    }

    pub fn name(&self) -> &'static str {
        match self {
            StateCase::NotSet => "NotSet",
            StateCase::Welcome => "Welcome",
            StateCase::ComponentsRepair => "ComponentsRepair",
            StateCase::DeviceDestination => "DeviceDestination",
            StateCase::WpDisableMethod => "WpDisableMethod",
            StateCase::WpDisableRsu => "WpDisableRsu",
            StateCase::WpDisablePhysical => "WpDisablePhysical",
            StateCase::WpDisableComplete => "WpDisableComplete",
            StateCase::UpdateRoFirmware => "UpdateRoFirmware",
            StateCase::Restock => "Restock",
            StateCase::UpdateDeviceInfo => "UpdateDeviceInfo",
            StateCase::CheckCalibration => "CheckCalibration",
            StateCase::SetupCalibration => "SetupCalibration",
            StateCase::RunCalibration => "RunCalibration",
            StateCase::ProvisionDevice => "ProvisionDevice",
            StateCase::WpEnablePhysical => "WpEnablePhysical",
            StateCase::Finalize => "Finalize",
            StateCase::RepairComplete => "RepairComplete",
            StateCase::WipeSelection => "WipeSelection",
        }
    }
}

impl fmt::Display for StateCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tagged payload submitted for, or reported by, a workflow state
///
/// The tag must always agree with the state the controller considers active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "payload", rename_all = "snake_case")]
pub enum RmadState {
    NotSet,
    Welcome(WelcomeState),
    ComponentsRepair(ComponentsRepairState),
    DeviceDestination(DeviceDestinationState),
    WpDisableMethod(WpDisableMethodState),
    WpDisableRsu(WpDisableRsuState),
    WpDisablePhysical(WpDisablePhysicalState),
    WpDisableComplete(WpDisableCompleteState),
    UpdateRoFirmware(UpdateRoFirmwareState),
    Restock(RestockState),
    UpdateDeviceInfo(UpdateDeviceInfoState),
    CheckCalibration(CheckCalibrationState),
    SetupCalibration(SetupCalibrationState),
    RunCalibration(RunCalibrationState),
    ProvisionDevice(ProvisionDeviceState),
    WpEnablePhysical(WpEnablePhysicalState),
    Finalize(FinalizeState),
    RepairComplete(RepairCompleteState),
    WipeSelection(WipeSelectionState),
}

impl RmadState {
    pub fn state_case(&self) -> StateCase {
        match self {
            RmadState::NotSet => StateCase::NotSet,
            RmadState::Welcome(_) => StateCase::Welcome,
            RmadState::ComponentsRepair(_) => StateCase::ComponentsRepair,
            RmadState::DeviceDestination(_) => StateCase::DeviceDestination,
            RmadState::WpDisableMethod(_) => StateCase::WpDisableMethod,
            RmadState::WpDisableRsu(_) => StateCase::WpDisableRsu,
            RmadState::WpDisablePhysical(_) => StateCase::WpDisablePhysical,
            RmadState::WpDisableComplete(_) => StateCase::WpDisableComplete,
            RmadState::UpdateRoFirmware(_) => StateCase::UpdateRoFirmware,
            RmadState::Restock(_) => StateCase::Restock,
            RmadState::UpdateDeviceInfo(_) => StateCase::UpdateDeviceInfo,
            RmadState::CheckCalibration(_) => StateCase::CheckCalibration,
            RmadState::SetupCalibration(_) => StateCase::SetupCalibration,
            RmadState::RunCalibration(_) => StateCase::RunCalibration,
            RmadState::ProvisionDevice(_) => StateCase::ProvisionDevice,
            RmadState::WpEnablePhysical(_) => StateCase::WpEnablePhysical,
            RmadState::Finalize(_) => StateCase::Finalize,
            RmadState::RepairComplete(_) => StateCase::RepairComplete,
            RmadState::WipeSelection(_) => StateCase::WipeSelection,
        }
    }

    /// Empty payload for `state_case`
    pub fn default_for(state_case: StateCase) -> Self {
        match state_case {
            StateCase::NotSet => RmadState::NotSet,
            StateCase::Welcome => RmadState::Welcome(Default::default()),
            StateCase::ComponentsRepair => RmadState::ComponentsRepair(Default::default()),
            StateCase::DeviceDestination => RmadState::DeviceDestination(Default::default()),
            StateCase::WpDisableMethod => RmadState::WpDisableMethod(Default::default()),
            StateCase::WpDisableRsu => RmadState::WpDisableRsu(Default::default()),
            StateCase::WpDisablePhysical => RmadState::WpDisablePhysical(Default::default()),
            StateCase::WpDisableComplete => RmadState::WpDisableComplete(Default::default()),
            StateCase::UpdateRoFirmware => RmadState::UpdateRoFirmware(Default::default()),
            StateCase::Restock => RmadState::Restock(Default::default()),
            StateCase::UpdateDeviceInfo => RmadState::UpdateDeviceInfo(Default::default()),
            StateCase::CheckCalibration => RmadState::CheckCalibration(Default::default()),
            StateCase::SetupCalibration => RmadState::SetupCalibration(Default::default()),
            StateCase::RunCalibration => RmadState::RunCalibration(Default::default()),
            StateCase::ProvisionDevice => RmadState::ProvisionDevice(Default::default()),
            StateCase::WpEnablePhysical => RmadState::WpEnablePhysical(Default::default()),
            StateCase::Finalize => RmadState::Finalize(Default::default()),
            StateCase::RepairComplete => RmadState::RepairComplete(Default::default()),
            StateCase::WipeSelection => RmadState::WipeSelection(Default::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_state_case_ids_round_trip() {
        for state_case in StateCase::ALL {
            assert_eq!(StateCase::from_i32(state_case.as_i32()), Some(state_case));
            assert_eq!(RmadState::default_for(state_case).state_case(), state_case);
        }
        assert_eq!(StateCase::from_i32(0), Some(StateCase::NotSet));
        assert_eq!(StateCase::from_i32(99), None);
    }

    #[test]
    fn test_payload_tagging() {
        let state = RmadState::DeviceDestination(DeviceDestinationState {
            destination: Destination::Different,
        });
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(
            value,
            json!({"state": "device_destination", "payload": {"destination": "different"}})
        );

        let parsed: RmadState =
            serde_json::from_value(json!({"state": "welcome", "payload": {}})).unwrap();
        assert_eq!(parsed, RmadState::Welcome(WelcomeState::default()));
    }
}
