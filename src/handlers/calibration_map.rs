use std::collections::BTreeMap;
use tracing::warn;

use crate::state::{
    CalibrationComponentStatus, CalibrationSetupInstruction, CalibrationStatus, RmadComponent,
};
use crate::store::{keys, JsonStore};

/// Setup instruction -> component -> calibration status, as persisted under
/// `calibration_map`
pub type CalibrationMap =
    BTreeMap<CalibrationSetupInstruction, BTreeMap<RmadComponent, CalibrationStatus>>;

type RawCalibrationMap = BTreeMap<String, BTreeMap<String, CalibrationStatus>>;

/// Builds the map for the replaced components that need calibration
pub fn build(replaced: &[RmadComponent]) -> CalibrationMap {
    let mut map = CalibrationMap::new();
    for component in replaced {
        if let Some(instruction) = component.calibration_instruction() {
            map.entry(instruction)
                .or_default()
                .insert(*component, CalibrationStatus::Waiting);
        }
    }
    map
}

/// `None` when the key is absent or holds unknown instructions or components
pub fn read(store: &JsonStore) -> Option<CalibrationMap> {
    let raw: RawCalibrationMap = store.get_deserialized(keys::CALIBRATION_MAP)?;
    let mut map = CalibrationMap::new();
    for (instruction_key, components) in raw {
        let Some(instruction) = CalibrationSetupInstruction::from_key(&instruction_key) else {
            warn!(instruction = %instruction_key, "Unknown calibration instruction in store");
            return None;
        };
        let entry = map.entry(instruction).or_default();
        for (name, status) in components {
            let Some(component) = RmadComponent::from_name(&name) else {
                warn!(component = %name, "Unknown calibration component in store");
                return None;
            };
            entry.insert(component, status);
        }
    }
    Some(map)
}

pub fn write(store: &JsonStore, map: &CalibrationMap) -> bool {
    let raw: RawCalibrationMap = map
        .iter()
        .map(|(instruction, components)| {
            (
                instruction.key().to_string(),
                components
                    .iter()
                    .map(|(component, status)| (component.name().to_string(), *status))
                    .collect(),
            )
        })
        .collect();
    store.set_serialized(keys::CALIBRATION_MAP, &raw)
}

/// First instruction that still has components waiting for calibration
pub fn next_pending_instruction(map: &CalibrationMap) -> Option<CalibrationSetupInstruction> {
    map.iter()
        .find(|(_, components)| components.values().any(|s| s.is_pending()))
        .map(|(instruction, _)| *instruction)
}

pub fn statuses(map: &CalibrationMap) -> Vec<CalibrationComponentStatus> {
    map.values()
        .flat_map(|components| {
            components
                .iter()
                .map(|(component, status)| CalibrationComponentStatus {
                    component: *component,
                    status: *status,
                })
        })
        .collect()
}

pub fn statuses_for(
    map: &CalibrationMap,
    instruction: CalibrationSetupInstruction,
) -> Vec<CalibrationComponentStatus> {
    map.get(&instruction)
        .map(|components| {
            components
                .iter()
                .map(|(component, status)| CalibrationComponentStatus {
                    component: *component,
                    status: *status,
                })
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_build_groups_by_instruction() {
        let map = build(&[
            RmadComponent::Battery,
            RmadComponent::LidGyroscope,
            RmadComponent::BaseAccelerometer,
        ]);
        assert_eq!(map.len(), 2);
        assert_eq!(
            next_pending_instruction(&map),
            Some(CalibrationSetupInstruction::PlaceBaseOnFlatSurface)
        );
        assert_eq!(statuses(&map).len(), 2);
    }

    #[test]
    fn test_persisted_form_uses_symbolic_names() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path().join("state"));
        let map = build(&[RmadComponent::LidAccelerometer]);
        assert!(write(&store, &map));

        assert_eq!(
            store.get_value(keys::CALIBRATION_MAP).unwrap(),
            serde_json::json!({
                "place_lid_on_flat_surface": {"RMAD_COMPONENT_LID_ACCELEROMETER": "waiting"}
            })
        );
        assert_eq!(read(&store), Some(map));
    }

    #[test]
    fn test_unknown_entries_are_rejected() {
        let dir = TempDir::new().unwrap();
        let store = JsonStore::open(dir.path().join("state"));
        assert!(store.set_value(
            keys::CALIBRATION_MAP,
            serde_json::json!({"place_on_ceiling": {}}),
        ));
        assert_eq!(read(&store), None);
    }
}
