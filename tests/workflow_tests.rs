//! End-to-end workflow tests
//!
//! Each test drives a real controller over a temporary state file and a fake
//! device, restarting the controller from disk where a reboot would happen.

mod fixtures;

use fixtures::harness::{components, destination, welcome, Harness, START_SECONDS};
use rmad::controller::ResumeError;
use rmad::hardware::fake::FakeDeviceState;
use rmad::metrics::{utils as metrics_utils, MetricsStorage, SessionOutcome};
use rmad::state::{
    Destination, FinalizeChoice, FinalizeState, ProvisionChoice, ProvisionDeviceState,
    RepairCompleteShutdown, RepairCompleteState, RestockChoice, RestockState, RmadComponent,
    UpdateRoFirmwareChoice, UpdateRoFirmwareState, WpDisableMethodChoice, WpDisableMethodState,
    WpDisableRsuState,
};
use rmad::store::keys;
use rmad::{RmadController, RmadErrorCode, RmadState, StateCase};

fn next(controller: &mut RmadController, state: RmadState) -> StateCase {
    let reply = controller.transition_next_state(&state);
    assert!(
        matches!(
            reply.error,
            RmadErrorCode::Ok | RmadErrorCode::ExpectReboot | RmadErrorCode::ExpectShutdown
        ),
        "unexpected {:?} submitting {:?}",
        reply.error,
        state.state_case()
    );
    reply.state.state_case()
}

fn resume_error(h: &Harness) -> ResumeError {
    match RmadController::new(h.context(), h.options()) {
        Ok(_) => panic!("Resume should have failed"),
        Err(e) => e,
    }
}

/// Submits the payload the current state reports, unchanged
fn accept_current(controller: &mut RmadController) -> StateCase {
    let state = controller.get_current_state().state;
    next(controller, state)
}

#[test]
fn test_same_owner_without_wp_disable_goes_to_finalize() {
    let h = Harness::new();
    let mut controller = h.controller();

    assert_eq!(controller.get_current_state().state.state_case(), StateCase::Welcome);
    assert_eq!(next(&mut controller, welcome()), StateCase::ComponentsRepair);
    assert_eq!(next(&mut controller, components(&[RmadComponent::Battery])), StateCase::DeviceDestination);
    assert_eq!(next(&mut controller, destination(Destination::Same)), StateCase::Finalize);

    let finalize = RmadState::Finalize(FinalizeState {
        choice: FinalizeChoice::Continue,
        ..Default::default()
    });
    assert_eq!(next(&mut controller, finalize), StateCase::RepairComplete);

    let reply = controller.transition_next_state(&RmadState::RepairComplete(RepairCompleteState {
        shutdown: RepairCompleteShutdown::Reboot,
        powerwash_required: false,
    }));
    assert_eq!(reply.error, RmadErrorCode::ExpectReboot);
    assert!(controller.is_session_over());
    assert!(!h.store_path().exists());

    let records = MetricsStorage::new(h.metrics_dir()).load_final_snapshots().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].outcome, SessionOutcome::Complete);
    assert!(records[0].metrics.is_complete);
    assert_eq!(
        records[0].metrics.additional_activities,
        vec!["RMAD_ADDITIONAL_ACTIVITY_REBOOT".to_string()]
    );
}

#[test]
fn test_different_owner_picks_wp_disable_route() {
    let h = Harness::new();
    let mut controller = h.controller();
    next(&mut controller, welcome());
    next(&mut controller, components(&[]));
    assert_eq!(next(&mut controller, destination(Destination::Different)), StateCase::WpDisableMethod);

    let blocked = Harness::with_device(FakeDeviceState {
        ccd_blocked: true,
        ..Default::default()
    });
    let mut controller = blocked.controller();
    next(&mut controller, welcome());
    next(&mut controller, components(&[]));
    assert_eq!(next(&mut controller, destination(Destination::Different)), StateCase::WpDisableRsu);
}

#[test]
fn test_restart_resumes_same_state_and_history() {
    let h = Harness::new();
    {
        let mut controller = h.controller();
        next(&mut controller, welcome());
        next(&mut controller, components(&[]));
        assert_eq!(controller.current_state_case(), StateCase::DeviceDestination);
    }

    let controller = h.controller();
    assert_eq!(controller.current_state_case(), StateCase::DeviceDestination);
    assert_eq!(
        controller.state_history(),
        &[StateCase::Welcome, StateCase::ComponentsRepair]
    );
    assert!(controller.can_go_back());
    assert!(controller.can_abort());
}

#[test]
fn test_tag_mismatch_leaves_state_and_metrics() {
    let h = Harness::new();
    let mut controller = h.controller();
    next(&mut controller, welcome());

    let store = h.context().store;
    let history_before = store.get::<Vec<i32>>(keys::STATE_HISTORY);
    let state_metrics_before = metrics_utils::get_state_metrics(&store);

    let reply = controller.transition_next_state(&destination(Destination::Same));
    assert_eq!(reply.error, RmadErrorCode::RequestInvalid);
    assert_eq!(reply.state.state_case(), StateCase::ComponentsRepair);

    let store = h.context().store;
    assert_eq!(store.get::<i32>(keys::CURRENT_STATE), Some(StateCase::ComponentsRepair.as_i32()));
    assert_eq!(store.get::<Vec<i32>>(keys::STATE_HISTORY), history_before);
    assert_eq!(metrics_utils::get_state_metrics(&store), state_metrics_before);
    assert_eq!(
        metrics_utils::snapshot(&store).occurred_errors,
        vec!["RMAD_ERROR_REQUEST_INVALID".to_string()]
    );
}

#[test]
fn test_whitelisted_codes_not_recorded() {
    let h = Harness::with_device(FakeDeviceState {
        hwwp_enabled: Some(true),
        ..Default::default()
    });
    let mut controller = h.controller();
    next(&mut controller, welcome());
    next(&mut controller, components(&[]));
    next(&mut controller, destination(Destination::Different));
    let method = RmadState::WpDisableMethod(WpDisableMethodState {
        choice: WpDisableMethodChoice::Physical,
    });
    assert_eq!(next(&mut controller, method), StateCase::WpDisablePhysical);

    // Switch still on: the handler asks the caller to wait.
    let reply = controller.transition_next_state(&RmadState::WpDisablePhysical(Default::default()));
    assert_eq!(reply.error, RmadErrorCode::Wait);
    assert!(metrics_utils::snapshot(&h.context().store).occurred_errors.is_empty());
}

#[test]
fn test_previous_state_rules() {
    let h = Harness::new();
    let mut controller = h.controller();
    assert_eq!(controller.transition_previous_state().error, RmadErrorCode::RequestInvalid);

    next(&mut controller, welcome());
    next(&mut controller, components(&[]));
    let reply = controller.transition_previous_state();
    assert_eq!(reply.error, RmadErrorCode::Ok);
    assert_eq!(reply.state.state_case(), StateCase::ComponentsRepair);
    assert_eq!(controller.state_history(), &[StateCase::Welcome]);
}

#[test]
fn test_physical_path_with_restock_shutdown() {
    let h = Harness::new();
    let mut controller = h.controller();
    next(&mut controller, welcome());
    next(&mut controller, components(&[RmadComponent::Screen]));
    next(&mut controller, destination(Destination::Different));
    next(
        &mut controller,
        RmadState::WpDisableMethod(WpDisableMethodState {
            choice: WpDisableMethodChoice::Physical,
        }),
    );
    h.device.update(|d| d.hwwp_enabled = Some(false));
    assert_eq!(
        next(&mut controller, RmadState::WpDisablePhysical(Default::default())),
        StateCase::WpDisableComplete
    );
    assert!(!controller.can_abort());
    assert!(!controller.can_go_back());
    assert_eq!(controller.abort_rma(), RmadErrorCode::RmaNotAbortable);

    assert_eq!(accept_current(&mut controller), StateCase::UpdateRoFirmware);
    // WpDisableComplete cannot be re-entered.
    assert!(controller.state_history().is_empty());
    assert_eq!(controller.transition_previous_state().error, RmadErrorCode::RequestInvalid);

    let skip = RmadState::UpdateRoFirmware(UpdateRoFirmwareState {
        choice: UpdateRoFirmwareChoice::Skip,
        optional: true,
    });
    assert_eq!(next(&mut controller, skip), StateCase::Restock);

    h.advance_seconds(300);
    let reply = controller.transition_next_state(&RmadState::Restock(RestockState {
        choice: RestockChoice::Shutdown,
    }));
    assert_eq!(reply.error, RmadErrorCode::ExpectShutdown);
    assert_eq!(reply.state.state_case(), StateCase::UpdateDeviceInfo);

    let metrics = metrics_utils::snapshot(&h.context().store);
    assert_eq!(metrics.running_time, 300.0);
    assert_eq!(metrics.wp_disable_method.as_deref(), Some("PHYSICAL_ASSEMBLE_DEVICE"));

    // Powered back on.
    drop(controller);
    let mut controller = h.controller();
    assert_eq!(controller.current_state_case(), StateCase::UpdateDeviceInfo);
    assert_eq!(accept_current(&mut controller), StateCase::ProvisionDevice);
    let provision = RmadState::ProvisionDevice(ProvisionDeviceState {
        choice: ProvisionChoice::Continue,
        ..Default::default()
    });
    assert_eq!(next(&mut controller, provision), StateCase::Finalize);
    let finalize = RmadState::Finalize(FinalizeState {
        choice: FinalizeChoice::Continue,
        ..Default::default()
    });
    assert_eq!(next(&mut controller, finalize), StateCase::WpEnablePhysical);

    h.device.update(|d| d.hwwp_enabled = Some(true));
    assert_eq!(accept_current(&mut controller), StateCase::RepairComplete);
    let reply = controller.get_current_state();
    assert!(matches!(
        reply.state,
        RmadState::RepairComplete(RepairCompleteState {
            powerwash_required: true,
            ..
        })
    ));
}

#[test]
fn test_rsu_reboot_and_running_time() {
    let h = Harness::with_device(FakeDeviceState {
        ccd_blocked: true,
        ..Default::default()
    });
    let mut controller = h.controller();
    next(&mut controller, welcome());
    next(&mut controller, components(&[]));
    assert_eq!(next(&mut controller, destination(Destination::Different)), StateCase::WpDisableRsu);

    h.advance_seconds(120);
    let reply = controller.transition_next_state(&RmadState::WpDisableRsu(WpDisableRsuState {
        unlock_code: "UNLOCK01".to_string(),
        ..Default::default()
    }));
    assert_eq!(reply.error, RmadErrorCode::ExpectReboot);
    assert_eq!(reply.state.state_case(), StateCase::WpDisableRsu);

    let metrics = metrics_utils::snapshot(&h.context().store);
    assert_eq!(metrics.running_time, 120.0);
    assert_eq!(metrics.setup_timestamp, Some((START_SECONDS + 120) as f64));

    drop(controller);
    h.device.reboot();
    h.advance_seconds(60);
    let mut controller = h.controller();
    assert_eq!(controller.current_state_case(), StateCase::WpDisableRsu);
    // Downtime is not counted.
    let metrics = metrics_utils::snapshot(&h.context().store);
    assert_eq!(metrics.setup_timestamp, Some((START_SECONDS + 180) as f64));
    assert_eq!(metrics.running_time, 120.0);

    assert_eq!(
        next(&mut controller, RmadState::WpDisableRsu(Default::default())),
        StateCase::WpDisableComplete
    );
}

#[test]
fn test_calibration_path_with_write_protect_already_off() {
    let h = Harness::with_device(FakeDeviceState {
        hwwp_enabled: Some(false),
        ..Default::default()
    });
    let mut controller = h.controller();
    next(&mut controller, welcome());
    next(&mut controller, components(&[RmadComponent::BaseGyroscope]));
    assert_eq!(next(&mut controller, destination(Destination::Same)), StateCase::WpDisableComplete);
    assert_eq!(accept_current(&mut controller), StateCase::UpdateRoFirmware);

    let update = RmadState::UpdateRoFirmware(UpdateRoFirmwareState {
        choice: UpdateRoFirmwareChoice::Update,
        optional: true,
    });
    assert_eq!(next(&mut controller, update), StateCase::UpdateDeviceInfo);
    assert_eq!(accept_current(&mut controller), StateCase::ProvisionDevice);

    let provision = RmadState::ProvisionDevice(ProvisionDeviceState {
        choice: ProvisionChoice::Continue,
        ..Default::default()
    });
    assert_eq!(next(&mut controller, provision), StateCase::SetupCalibration);
    assert_eq!(accept_current(&mut controller), StateCase::RunCalibration);
    assert_eq!(accept_current(&mut controller), StateCase::Finalize);
    assert_eq!(h.device.snapshot().calibration_calls, 1);

    let metrics = metrics_utils::snapshot(&h.context().store);
    assert_eq!(metrics.wp_disable_method.as_deref(), Some("SKIPPED"));
    assert_eq!(metrics.ro_firmware_verified, Some(true));
    assert!(metrics.additional_activities.contains(&"RMAD_ADDITIONAL_ACTIVITY_REBOOT".to_string()));
}

#[test]
fn test_abort_before_point_of_no_return() {
    let h = Harness::new();
    let mut controller = h.controller();
    next(&mut controller, welcome());
    next(&mut controller, components(&[]));

    assert_eq!(controller.abort_rma(), RmadErrorCode::RmaNotRequired);
    assert!(!h.store_path().exists());
    assert_eq!(
        controller.transition_next_state(&destination(Destination::Same)).error,
        RmadErrorCode::RmaNotRequired
    );

    let records = MetricsStorage::new(h.metrics_dir()).load_final_snapshots().unwrap();
    assert_eq!(records[0].outcome, SessionOutcome::Aborted);
    let aborted = &records[0].metrics.state_metrics[&StateCase::DeviceDestination.as_i32().to_string()];
    assert!(aborted.is_aborted);
}

#[test]
fn test_corrupt_stored_indices_fail_resume() {
    let h = Harness::new();
    let document = serde_json::json!({
        "current_state": StateCase::UpdateDeviceInfo.as_i32(),
        "state_history": [],
        "same_owner": true,
        "state_map": {
            "10": {
                "state": "update_device_info",
                "payload": {
                    "serial_number": "SN",
                    "region_list": ["us"],
                    "region_index": 7
                }
            }
        }
    });
    std::fs::create_dir_all(h.store_path().parent().unwrap()).unwrap();
    std::fs::write(h.store_path(), document.to_string()).unwrap();

    let err = resume_error(&h);
    assert!(matches!(
        err,
        ResumeError::Initialization {
            state: StateCase::UpdateDeviceInfo,
            error: RmadErrorCode::StateHandlerInitializationFailed,
        }
    ));
}

#[test]
fn test_unknown_stored_state_fails_resume() {
    let h = Harness::new();
    std::fs::create_dir_all(h.store_path().parent().unwrap()).unwrap();
    std::fs::write(h.store_path(), r#"{"current_state": 2, "state_history": [1, 42]}"#).unwrap();

    let err = resume_error(&h);
    assert!(matches!(err, ResumeError::UnknownState(42)));
}

#[test]
fn test_mistyped_history_fails_resume() {
    let h = Harness::new();
    {
        let mut controller = h.controller();
        next(&mut controller, welcome());
        next(&mut controller, components(&[]));
    }
    assert!(h.context().store.set_value(keys::STATE_HISTORY, serde_json::json!("garbage")));

    let err = resume_error(&h);
    assert!(matches!(err, ResumeError::UnknownState(-1)));
}

#[test]
fn test_unrepeatable_state_rejects_second_submission() {
    let h = Harness::with_device(FakeDeviceState {
        hwwp_enabled: Some(false),
        ..Default::default()
    });
    let mut controller = h.controller();
    next(&mut controller, welcome());
    next(&mut controller, components(&[RmadComponent::BaseGyroscope]));
    assert_eq!(next(&mut controller, destination(Destination::Same)), StateCase::WpDisableComplete);

    let payload = controller.get_current_state().state;
    assert_eq!(next(&mut controller, payload.clone()), StateCase::UpdateRoFirmware);

    let store = h.context().store;
    let current_before = store.get::<i32>(keys::CURRENT_STATE);
    let history_before = store.get::<Vec<i32>>(keys::STATE_HISTORY);
    let state_metrics_before = metrics_utils::get_state_metrics(&store);

    let reply = controller.transition_next_state(&payload);
    assert_eq!(reply.error, RmadErrorCode::RequestInvalid);
    assert_eq!(reply.state.state_case(), StateCase::UpdateRoFirmware);
    assert!(!reply.can_go_back);

    let store = h.context().store;
    assert_eq!(store.get::<i32>(keys::CURRENT_STATE), current_before);
    assert_eq!(current_before, Some(StateCase::UpdateRoFirmware.as_i32()));
    assert_eq!(store.get::<Vec<i32>>(keys::STATE_HISTORY), history_before);
    assert_eq!(metrics_utils::get_state_metrics(&store), state_metrics_before);
}

#[test]
fn test_unreadable_store_refuses_to_start() {
    let h = Harness::new();
    std::fs::create_dir_all(h.store_path().parent().unwrap()).unwrap();
    std::fs::write(h.store_path(), "not json").unwrap();

    let err = resume_error(&h);
    assert!(matches!(err, ResumeError::StoreUnavailable { .. }));
}
