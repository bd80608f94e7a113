use serde::{Deserialize, Serialize};

use super::component::{
    CalibrationComponentStatus, CalibrationSetupInstruction, ComponentRepairStatus,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WelcomeChoice {
    #[default]
    Unknown,
    Cancel,
    FinalizeRepair,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WelcomeState {
    pub choice: WelcomeChoice,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentsRepairState {
    pub components: Vec<ComponentRepairStatus>,
    pub mainboard_rework: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Destination {
    #[default]
    Unknown,
    Same,
    Different,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceDestinationState {
    pub destination: Destination,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WipeSelectionState {
    pub wipe_device: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WpDisableMethodChoice {
    #[default]
    Unknown,
    Rsu,
    Physical,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WpDisableMethodState {
    pub choice: WpDisableMethodChoice,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WpDisableRsuState {
    pub challenge_code: String,
    pub hwid: String,
    pub challenge_url: String,
    pub unlock_code: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WpDisablePhysicalAction {
    #[default]
    Unknown,
    /// Device will be wiped, so it can be reassembled afterwards
    AssembleDevice,
    /// Keep the case open until write protect is re-enabled at the end
    KeepDeviceOpen,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WpDisablePhysicalState {
    pub action: WpDisablePhysicalAction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WpDisableCompleteAction {
    #[default]
    Unknown,
    SkippedAssembleDevice,
    CompleteAssembleDevice,
    CompleteKeepDeviceOpen,
    CompleteNoOp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WpDisableCompleteState {
    pub action: WpDisableCompleteAction,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateRoFirmwareChoice {
    #[default]
    Unknown,
    Skip,
    Update,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateRoFirmwareState {
    pub choice: UpdateRoFirmwareChoice,
    /// Skipping is only allowed when the RO firmware passed verification
    pub optional: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestockChoice {
    #[default]
    Unknown,
    Shutdown,
    Continue,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestockState {
    pub choice: RestockChoice,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateDeviceInfoState {
    pub original_serial_number: String,
    pub original_region_index: Option<usize>,
    pub original_sku_index: Option<usize>,
    pub original_custom_label_index: Option<usize>,
    pub original_dram_part_number: String,
    pub region_list: Vec<String>,
    pub sku_list: Vec<u64>,
    pub custom_label_list: Vec<String>,
    pub serial_number: String,
    pub region_index: Option<usize>,
    pub sku_index: Option<usize>,
    pub custom_label_index: Option<usize>,
    pub dram_part_number: String,
    pub mlb_repair: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionChoice {
    #[default]
    Unknown,
    Continue,
    Retry,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStatus {
    #[default]
    Unknown,
    InProgress,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionDeviceState {
    pub choice: ProvisionChoice,
    pub status: ProvisionStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetupCalibrationState {
    pub instruction: CalibrationSetupInstruction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunCalibrationState {
    pub instruction: CalibrationSetupInstruction,
    pub components: Vec<CalibrationComponentStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckCalibrationState {
    pub components: Vec<CalibrationComponentStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WpEnablePhysicalState {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeChoice {
    #[default]
    Unknown,
    Continue,
    Retry,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizeStatus {
    #[default]
    Unknown,
    Complete,
    Failed,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinalizeState {
    pub choice: FinalizeChoice,
    pub status: FinalizeStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairCompleteShutdown {
    #[default]
    Unknown,
    Reboot,
    Shutdown,
    BatteryCutoff,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepairCompleteState {
    pub shutdown: RepairCompleteShutdown,
    pub powerwash_required: bool,
}
