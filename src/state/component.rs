use serde::{Deserialize, Serialize};
use std::fmt;

/// Replaceable hardware components a technician can report on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RmadComponent {
    AudioCodec,
    Battery,
    Storage,
    Network,
    Camera,
    Screen,
    Keyboard,
    Touchpad,
    PowerButton,
    Fingerprint,
    BaseAccelerometer,
    LidAccelerometer,
    BaseGyroscope,
    LidGyroscope,
}

impl RmadComponent {
    pub const ALL: [RmadComponent; 14] = [
        RmadComponent::AudioCodec,
        RmadComponent::Battery,
        RmadComponent::Storage,
        RmadComponent::Network,
        RmadComponent::Camera,
        RmadComponent::Screen,
        RmadComponent::Keyboard,
        RmadComponent::Touchpad,
        RmadComponent::PowerButton,
        RmadComponent::Fingerprint,
        RmadComponent::BaseAccelerometer,
        RmadComponent::LidAccelerometer,
        RmadComponent::BaseGyroscope,
        RmadComponent::LidGyroscope,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            RmadComponent::AudioCodec => "RMAD_COMPONENT_AUDIO_CODEC",
            RmadComponent::Battery => "RMAD_COMPONENT_BATTERY",
            RmadComponent::Storage => "RMAD_COMPONENT_STORAGE",
            RmadComponent::Network => "RMAD_COMPONENT_NETWORK",
            RmadComponent::Camera => "RMAD_COMPONENT_CAMERA",
            RmadComponent::Screen => "RMAD_COMPONENT_SCREEN",
            RmadComponent::Keyboard => "RMAD_COMPONENT_KEYBOARD",
            RmadComponent::Touchpad => "RMAD_COMPONENT_TOUCHPAD",
            RmadComponent::PowerButton => "RMAD_COMPONENT_POWER_BUTTON",
            RmadComponent::Fingerprint => "RMAD_COMPONENT_FINGERPRINT",
            RmadComponent::BaseAccelerometer => "RMAD_COMPONENT_BASE_ACCELEROMETER",
            RmadComponent::LidAccelerometer => "RMAD_COMPONENT_LID_ACCELEROMETER",
            RmadComponent::BaseGyroscope => "RMAD_COMPONENT_BASE_GYROSCOPE",
            RmadComponent::LidGyroscope => "RMAD_COMPONENT_LID_GYROSCOPE",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Setup step a replaced component must go through before calibration
    pub fn calibration_instruction(&self) -> Option<CalibrationSetupInstruction> {
        match self {
            RmadComponent::BaseAccelerometer | RmadComponent::BaseGyroscope => {
                Some(CalibrationSetupInstruction::PlaceBaseOnFlatSurface)
            }
            RmadComponent::LidAccelerometer | RmadComponent::LidGyroscope => {
                Some(CalibrationSetupInstruction::PlaceLidOnFlatSurface)
            }
            _ => None,
        }
    }

    /// Replacing these components means writing write-protected data
    pub fn requires_wp_disable(&self) -> bool {
        self.calibration_instruction().is_some() || *self == RmadComponent::Fingerprint
    }
}

impl fmt::Display for RmadComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStatus {
    #[default]
    Unknown,
    Original,
    Replaced,
    Missing,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRepairStatus {
    pub component: RmadComponent,
    #[serde(default)]
    pub repair_status: RepairStatus,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationSetupInstruction {
    #[default]
    Unknown,
    PlaceBaseOnFlatSurface,
    PlaceLidOnFlatSurface,
    NoNeedCalibration,
}

impl CalibrationSetupInstruction {
    pub fn key(&self) -> &'static str {
        match self {
            CalibrationSetupInstruction::Unknown => "unknown",
            CalibrationSetupInstruction::PlaceBaseOnFlatSurface => "place_base_on_flat_surface",
            CalibrationSetupInstruction::PlaceLidOnFlatSurface => "place_lid_on_flat_surface",
            CalibrationSetupInstruction::NoNeedCalibration => "no_need_calibration",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        [
            CalibrationSetupInstruction::PlaceBaseOnFlatSurface,
            CalibrationSetupInstruction::PlaceLidOnFlatSurface,
        ]
        .into_iter()
        .find(|i| i.key() == key)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationStatus {
    #[default]
    Unknown,
    Waiting,
    InProgress,
    Complete,
    Failed,
    Skip,
    Retry,
}

impl CalibrationStatus {
    /// Still needs a calibration run
    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            CalibrationStatus::Waiting | CalibrationStatus::InProgress | CalibrationStatus::Retry
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalibrationComponentStatus {
    pub component: RmadComponent,
    #[serde(default)]
    pub status: CalibrationStatus,
}
