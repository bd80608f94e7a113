use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use tracing::info;

use super::{ComponentUtils, DeviceInfo, DeviceInfoUtils, FirmwareUtils, GscUtils, WriteProtectUtils};
use crate::state::RmadComponent;

/// Mutable knobs and call counters of the fake device
#[derive(Debug, Clone)]
pub struct FakeDeviceState {
    pub hwwp_enabled: Option<bool>,
    pub swwp_enabled: bool,
    pub ccd_blocked: bool,
    pub challenge_code: Option<String>,
    pub hwid: String,
    pub valid_unlock_code: String,
    /// RSU takes effect on the switch only after the next reboot
    pub rsu_pending: bool,
    pub device_info: Option<DeviceInfo>,
    pub region_list: Vec<String>,
    pub sku_list: Vec<u64>,
    pub custom_label_list: Vec<String>,
    pub write_device_info_succeeds: bool,
    pub probed: Vec<RmadComponent>,
    pub provision_succeeds: bool,
    pub failing_calibrations: HashSet<RmadComponent>,
    pub ro_verified: bool,
    pub firmware_update_succeeds: bool,
    pub finalize_succeeds: bool,
    pub rsu_attempts: u32,
    pub provision_calls: u32,
    pub calibration_calls: u32,
    pub device_info_writes: u32,
    pub firmware_updates: u32,
}

impl Default for FakeDeviceState {
    fn default() -> Self {
        Self {
            hwwp_enabled: Some(true),
            swwp_enabled: true,
            ccd_blocked: false,
            challenge_code: Some("AAAABBBBCCCCDDDD".to_string()),
            hwid: "FAKE-HWID A1B-C2D".to_string(),
            valid_unlock_code: "UNLOCK01".to_string(),
            rsu_pending: false,
            device_info: Some(DeviceInfo {
                serial_number: "SN-0001".to_string(),
                region: "us".to_string(),
                sku: Some(0x10),
                custom_label: String::new(),
                dram_part_number: "DRAM-42".to_string(),
            }),
            region_list: vec!["us".to_string(), "gb".to_string(), "jp".to_string()],
            sku_list: vec![0x10, 0x11, 0x12],
            custom_label_list: vec![String::new(), "partner-a".to_string()],
            write_device_info_succeeds: true,
            probed: RmadComponent::ALL.to_vec(),
            provision_succeeds: true,
            failing_calibrations: HashSet::new(),
            ro_verified: true,
            firmware_update_succeeds: true,
            finalize_succeeds: true,
            rsu_attempts: 0,
            provision_calls: 0,
            calibration_calls: 0,
            device_info_writes: 0,
            firmware_updates: 0,
        }
    }
}

/// In-memory device used in test mode and by the test suite
#[derive(Debug, Default)]
pub struct FakeDevice {
    state: Mutex<FakeDeviceState>,
}

impl FakeDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: FakeDeviceState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn update<F: FnOnce(&mut FakeDeviceState)>(&self, f: F) {
        f(&mut self.lock());
    }

    pub fn snapshot(&self) -> FakeDeviceState {
        self.lock().clone()
    }

    /// Applies effects that only land after a power cycle
    pub fn reboot(&self) {
        let mut state = self.lock();
        if state.rsu_pending {
            state.rsu_pending = false;
            state.hwwp_enabled = Some(false);
        }
        info!("Fake device rebooted");
    }

    fn lock(&self) -> MutexGuard<'_, FakeDeviceState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl WriteProtectUtils for FakeDevice {
    fn hardware_wp_enabled(&self) -> Option<bool> {
        self.lock().hwwp_enabled
    }

    fn enable_software_wp(&self) -> bool {
        self.lock().swwp_enabled = true;
        true
    }

    fn disable_software_wp(&self) -> bool {
        self.lock().swwp_enabled = false;
        true
    }
}

impl GscUtils for FakeDevice {
    fn ccd_blocked(&self) -> bool {
        self.lock().ccd_blocked
    }

    fn rsu_challenge_code(&self) -> Option<String> {
        self.lock().challenge_code.clone()
    }

    fn hwid(&self) -> Option<String> {
        Some(self.lock().hwid.clone())
    }

    fn perform_rsu(&self, unlock_code: &str) -> bool {
        let mut state = self.lock();
        state.rsu_attempts += 1;
        if unlock_code == state.valid_unlock_code {
            state.rsu_pending = true;
            true
        } else {
            false
        }
    }
}

impl DeviceInfoUtils for FakeDevice {
    fn read_device_info(&self) -> Option<DeviceInfo> {
        self.lock().device_info.clone()
    }

    fn write_device_info(&self, info: &DeviceInfo) -> bool {
        let mut state = self.lock();
        state.device_info_writes += 1;
        if state.write_device_info_succeeds {
            state.device_info = Some(info.clone());
            true
        } else {
            false
        }
    }

    fn region_list(&self) -> Vec<String> {
        self.lock().region_list.clone()
    }

    fn sku_list(&self) -> Vec<u64> {
        self.lock().sku_list.clone()
    }

    fn custom_label_list(&self) -> Vec<String> {
        self.lock().custom_label_list.clone()
    }
}

impl ComponentUtils for FakeDevice {
    fn probe_components(&self) -> Vec<RmadComponent> {
        self.lock().probed.clone()
    }

    fn provision(&self, _replaced: &[RmadComponent]) -> bool {
        let mut state = self.lock();
        state.provision_calls += 1;
        state.provision_succeeds
    }

    fn calibrate(&self, component: RmadComponent) -> bool {
        let mut state = self.lock();
        state.calibration_calls += 1;
        !state.failing_calibrations.contains(&component)
    }
}

impl FirmwareUtils for FakeDevice {
    fn ro_verified(&self) -> bool {
        self.lock().ro_verified
    }

    fn update_ro_firmware(&self) -> bool {
        let mut state = self.lock();
        state.firmware_updates += 1;
        state.firmware_update_succeeds
    }

    fn finalize(&self) -> bool {
        let mut state = self.lock();
        if state.finalize_succeeds {
            state.swwp_enabled = true;
        }
        state.finalize_succeeds
    }
}
