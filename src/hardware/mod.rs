//! Narrow interfaces to the hardware collaborators
//!
//! State handlers only talk to write protect, the GSC, VPD/CBI, component
//! probing/calibration and firmware through these traits. `system` shells out
//! to the platform tools; `fake` keeps everything in memory for test mode.

pub mod command;
pub mod fake;
pub mod system;

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::state::RmadComponent;

pub use command::{CommandError, CommandOutput, CommandRunner, ProcessCommandRunner};
pub use fake::FakeDevice;

/// Hardware and software write protect
pub trait WriteProtectUtils: Send + Sync {
    /// `None` when the switch state cannot be read
    fn hardware_wp_enabled(&self) -> Option<bool>;
    fn enable_software_wp(&self) -> bool;
    fn disable_software_wp(&self) -> bool;
}

/// Security chip (GSC) operations
pub trait GscUtils: Send + Sync {
    fn ccd_blocked(&self) -> bool;
    fn rsu_challenge_code(&self) -> Option<String>;
    fn hwid(&self) -> Option<String>;
    fn perform_rsu(&self, unlock_code: &str) -> bool;
}

/// Device identity kept in VPD and CBI
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub serial_number: String,
    pub region: String,
    pub sku: Option<u64>,
    pub custom_label: String,
    pub dram_part_number: String,
}

pub trait DeviceInfoUtils: Send + Sync {
    fn read_device_info(&self) -> Option<DeviceInfo>;
    fn write_device_info(&self, info: &DeviceInfo) -> bool;
    fn region_list(&self) -> Vec<String>;
    fn sku_list(&self) -> Vec<u64>;
    fn custom_label_list(&self) -> Vec<String>;
}

pub trait ComponentUtils: Send + Sync {
    fn probe_components(&self) -> Vec<RmadComponent>;
    fn provision(&self, replaced: &[RmadComponent]) -> bool;
    fn calibrate(&self, component: RmadComponent) -> bool;
}

pub trait FirmwareUtils: Send + Sync {
    fn ro_verified(&self) -> bool;
    fn update_ro_firmware(&self) -> bool;
    /// Locks the device down at the end of the repair
    fn finalize(&self) -> bool;
}

/// Bundle of collaborators injected into every state handler
#[derive(Clone)]
pub struct Hardware {
    pub write_protect: Arc<dyn WriteProtectUtils>,
    pub gsc: Arc<dyn GscUtils>,
    pub device_info: Arc<dyn DeviceInfoUtils>,
    pub components: Arc<dyn ComponentUtils>,
    pub firmware: Arc<dyn FirmwareUtils>,
}

impl std::fmt::Debug for Hardware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hardware").finish_non_exhaustive()
    }
}

impl Hardware {
    /// All collaborators backed by one in-memory fake device
    pub fn fake(device: Arc<FakeDevice>) -> Self {
        Self {
            write_protect: device.clone(),
            gsc: device.clone(),
            device_info: device.clone(),
            components: device.clone(),
            firmware: device,
        }
    }

    /// Collaborators that shell out to the platform tools
    pub fn system(runner: Arc<dyn CommandRunner>, options: system::SystemOptions) -> Self {
        Self {
            write_protect: Arc::new(system::SystemWriteProtect::new(runner.clone())),
            gsc: Arc::new(system::SystemGsc::new(runner.clone())),
            device_info: Arc::new(system::SystemDeviceInfo::new(runner.clone(), options)),
            components: Arc::new(system::SystemComponents::new(runner.clone())),
            firmware: Arc::new(system::SystemFirmware::new(runner)),
        }
    }
}
