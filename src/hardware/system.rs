use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use super::{
    CommandRunner, ComponentUtils, DeviceInfo, DeviceInfoUtils, FirmwareUtils, GscUtils,
    WriteProtectUtils,
};
use crate::state::RmadComponent;

/// Board-specific lists that are not readable from the device itself
#[derive(Debug, Clone, Default)]
pub struct SystemOptions {
    pub regions_database: PathBuf,
    pub sku_list: Vec<u64>,
    pub custom_label_list: Vec<String>,
}

pub struct SystemWriteProtect {
    runner: Arc<dyn CommandRunner>,
}

impl SystemWriteProtect {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl WriteProtectUtils for SystemWriteProtect {
    fn hardware_wp_enabled(&self) -> Option<bool> {
        match self.runner.output_of("crossystem", &["wpsw_cur"])?.as_str() {
            "1" => Some(true),
            "0" => Some(false),
            other => {
                warn!(value = %other, "Unexpected wpsw_cur value");
                None
            }
        }
    }

    fn enable_software_wp(&self) -> bool {
        self.runner.succeeds("flashrom", &["-p", "host", "--wp-enable"])
    }

    fn disable_software_wp(&self) -> bool {
        self.runner.succeeds("flashrom", &["-p", "host", "--wp-disable"])
    }
}

pub struct SystemGsc {
    runner: Arc<dyn CommandRunner>,
}

impl SystemGsc {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl GscUtils for SystemGsc {
    fn ccd_blocked(&self) -> bool {
        // Machine readable output is a list of KEY=VALUE lines.
        self.runner
            .output_of("gsctool", &["-a", "-I", "-M"])
            .map(|out| out.lines().any(|line| line.trim() == "CCD_BLOCKED=Y"))
            .unwrap_or(false)
    }

    fn rsu_challenge_code(&self) -> Option<String> {
        let out = self.runner.output_of("gsctool", &["-a", "-r", "-M"])?;
        let code: String = out
            .lines()
            .find_map(|line| line.strip_prefix("CHALLENGE="))
            .unwrap_or_default()
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        if code.is_empty() {
            None
        } else {
            Some(code)
        }
    }

    fn hwid(&self) -> Option<String> {
        self.runner.output_of("crossystem", &["hwid"])
    }

    fn perform_rsu(&self, unlock_code: &str) -> bool {
        let ok = self.runner.succeeds("gsctool", &["-a", "-r", unlock_code]);
        info!(accepted = %ok, "RSU unlock code submitted");
        ok
    }
}

pub struct SystemDeviceInfo {
    runner: Arc<dyn CommandRunner>,
    options: SystemOptions,
}

impl SystemDeviceInfo {
    pub fn new(runner: Arc<dyn CommandRunner>, options: SystemOptions) -> Self {
        Self { runner, options }
    }

    fn vpd_get(&self, key: &str) -> Option<String> {
        self.runner.output_of("vpd", &["-g", key])
    }

    fn vpd_set(&self, partition: &str, key: &str, value: &str) -> bool {
        let entry = format!("{}={}", key, value);
        self.runner.succeeds("vpd", &["-i", partition, "-s", &entry])
    }
}

impl DeviceInfoUtils for SystemDeviceInfo {
    fn read_device_info(&self) -> Option<DeviceInfo> {
        let sku = self
            .runner
            .output_of("ectool", &["cbi", "get", "2"])
            .and_then(|out| parse_cbi_number(&out));
        Some(DeviceInfo {
            serial_number: self.vpd_get("serial_number").unwrap_or_default(),
            region: self.vpd_get("region").unwrap_or_default(),
            sku,
            custom_label: self.vpd_get("custom_label_tag").unwrap_or_default(),
            dram_part_number: self
                .runner
                .output_of("ectool", &["cbi", "get", "3"])
                .unwrap_or_default(),
        })
    }

    fn write_device_info(&self, info: &DeviceInfo) -> bool {
        let mut ok = self.vpd_set("RO_VPD", "serial_number", &info.serial_number)
            && self.vpd_set("RO_VPD", "region", &info.region)
            && self.vpd_set("RO_VPD", "custom_label_tag", &info.custom_label);
        if let Some(sku) = info.sku {
            ok = ok && self.runner.succeeds("ectool", &["cbi", "set", "2", &sku.to_string(), "4"]);
        }
        ok
    }

    fn region_list(&self) -> Vec<String> {
        let contents = match std::fs::read_to_string(&self.options.regions_database) {
            Ok(contents) => contents,
            Err(e) => {
                warn!(path = ?self.options.regions_database, error = %e, "Cannot read regions database");
                return Vec::new();
            }
        };
        match serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(&contents) {
            Ok(regions) => {
                let mut list: Vec<String> = regions.keys().cloned().collect();
                list.sort();
                list
            }
            Err(e) => {
                warn!(error = %e, "Regions database is not a JSON object");
                Vec::new()
            }
        }
    }

    fn sku_list(&self) -> Vec<u64> {
        self.options.sku_list.clone()
    }

    fn custom_label_list(&self) -> Vec<String> {
        self.options.custom_label_list.clone()
    }
}

/// `ectool cbi get` prints e.g. `As uint: 16 (0x10)`
fn parse_cbi_number(output: &str) -> Option<u64> {
    output
        .lines()
        .find_map(|line| line.trim().strip_prefix("As uint:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|n| n.parse().ok())
}

pub struct SystemComponents {
    runner: Arc<dyn CommandRunner>,
}

impl SystemComponents {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

fn probe_category(component: RmadComponent) -> &'static str {
    match component {
        RmadComponent::AudioCodec => "audio_codec",
        RmadComponent::Battery => "battery",
        RmadComponent::Storage => "storage",
        RmadComponent::Network => "network",
        RmadComponent::Camera => "camera",
        RmadComponent::Screen => "display_panel",
        RmadComponent::Keyboard => "keyboard",
        RmadComponent::Touchpad => "touchpad",
        RmadComponent::PowerButton => "power_button",
        RmadComponent::Fingerprint => "fingerprint",
        RmadComponent::BaseAccelerometer => "base_accelerometer",
        RmadComponent::LidAccelerometer => "lid_accelerometer",
        RmadComponent::BaseGyroscope => "base_gyroscope",
        RmadComponent::LidGyroscope => "lid_gyroscope",
    }
}

fn motion_sensor_id(component: RmadComponent) -> Option<&'static str> {
    match component {
        RmadComponent::BaseAccelerometer => Some("0"),
        RmadComponent::LidAccelerometer => Some("1"),
        RmadComponent::BaseGyroscope => Some("2"),
        RmadComponent::LidGyroscope => Some("3"),
        _ => None,
    }
}

impl ComponentUtils for SystemComponents {
    fn probe_components(&self) -> Vec<RmadComponent> {
        let Some(out) = self.runner.output_of("runtime_probe", &["--to_stdout"]) else {
            return Vec::new();
        };
        let Ok(probed) = serde_json::from_str::<serde_json::Value>(&out) else {
            warn!("runtime_probe output is not JSON");
            return Vec::new();
        };
        RmadComponent::ALL
            .into_iter()
            .filter(|c| {
                probed
                    .get(probe_category(*c))
                    .and_then(|v| v.as_array())
                    .is_some_and(|found| !found.is_empty())
            })
            .collect()
    }

    fn provision(&self, replaced: &[RmadComponent]) -> bool {
        let secret = uuid::Uuid::new_v4().simple().to_string();
        let entry = format!("stable_device_secret_DO_NOT_SHARE={}", secret);
        let ok = self.runner.succeeds("vpd", &["-i", "RO_VPD", "-s", &entry]);
        info!(replaced = ?replaced, ok = %ok, "Provisioned device");
        ok
    }

    fn calibrate(&self, component: RmadComponent) -> bool {
        let Some(sensor) = motion_sensor_id(component) else {
            warn!(component = %component, "Component has no calibration routine");
            return false;
        };
        self.runner.succeeds("ectool", &["motionsense", "calibrate", sensor])
    }
}

pub struct SystemFirmware {
    runner: Arc<dyn CommandRunner>,
}

impl SystemFirmware {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }
}

impl FirmwareUtils for SystemFirmware {
    fn ro_verified(&self) -> bool {
        self.runner
            .output_of("gsctool", &["-a", "--ap_ro_verify_status"])
            .is_some_and(|out| out.contains("passed"))
    }

    fn update_ro_firmware(&self) -> bool {
        self.runner.succeeds("futility", &["update", "--mode=recovery"])
    }

    fn finalize(&self) -> bool {
        self.runner.succeeds("flashrom", &["-p", "host", "--wp-enable"])
            && self.runner.succeeds("gsctool", &["-a", "--factory", "disable"])
    }
}
