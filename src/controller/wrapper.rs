use tracing::{debug, error, warn};

use crate::error::RmadErrorCode;
use crate::handlers::GetNextStateCaseReply;
use crate::logs;
use crate::metrics::{utils as metrics_utils, AdditionalActivity, MetricsError};
use crate::state::StateCase;
use crate::store::JsonStore;

/// Maps a metrics failure onto the code reported to the caller
pub(crate) fn metrics_error_code(e: &MetricsError) -> RmadErrorCode {
    match e {
        MetricsError::CannotWrite | MetricsError::IoError(_) | MetricsError::SerializationError(_) => {
            RmadErrorCode::CannotWrite
        }
        MetricsError::NegativeDuration { .. } | MetricsError::MissingValue { .. } => {
            RmadErrorCode::TransitionFailed
        }
    }
}

/// Post-processes every reply produced by a state handler
///
/// Non-benign error codes go to the occurred-errors list and the event
/// journal. A requested additional activity is appended to the activity list;
/// power-cycle activities also fold the elapsed time into the running-time
/// accumulator. The decision itself passes through untouched unless one of
/// these writes fails, in which case the caller sees the failure and the
/// workflow stays where it is.
pub fn next_state_case_wrapper(
    store: &JsonStore,
    now: f64,
    current: StateCase,
    reply: GetNextStateCaseReply,
) -> GetNextStateCaseReply {
    if !reply.error.is_benign() {
        if let Err(e) = metrics_utils::record_occurred_error(store, reply.error) {
            error!(error = %e, code = %reply.error.symbol(), "Failed to record occurred error");
            return GetNextStateCaseReply::stay(metrics_error_code(&e), current);
        }
        if !logs::record_error(store, now, current, reply.error) {
            error!(code = %reply.error.symbol(), "Failed to append error event");
            return GetNextStateCaseReply::stay(RmadErrorCode::CannotWrite, current);
        }
        debug!(state = %current, code = %reply.error.symbol(), "Handler reported an error");
    }

    if reply.additional_activity != AdditionalActivity::Nothing {
        if let Err(e) = metrics_utils::record_additional_activity(store, now, reply.additional_activity) {
            warn!(
                error = %e,
                activity = %reply.additional_activity.symbol(),
                "Failed to record additional activity"
            );
            return GetNextStateCaseReply::stay(metrics_error_code(&e), current);
        }
    }

    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::keys;
    use crate::store::writer::MockDocumentWriter;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn store_with_setup(dir: &TempDir, setup: f64) -> JsonStore {
        let store = JsonStore::open(dir.path().join("state"));
        assert!(metrics_utils::initialize_setup_timestamps(&store, setup));
        store
    }

    #[test]
    fn test_benign_codes_not_recorded() {
        let dir = TempDir::new().unwrap();
        let store = store_with_setup(&dir, 100.0);

        for code in [RmadErrorCode::Ok, RmadErrorCode::Wait, RmadErrorCode::ExpectReboot] {
            let reply = GetNextStateCaseReply::stay(code, StateCase::Welcome);
            assert_eq!(next_state_case_wrapper(&store, 110.0, StateCase::Welcome, reply), reply);
        }
        assert!(metrics_utils::snapshot(&store).occurred_errors.is_empty());
        assert!(logs::get_events(&store).is_empty());
    }

    #[test]
    fn test_error_recorded_once() {
        let dir = TempDir::new().unwrap();
        let store = store_with_setup(&dir, 100.0);

        let reply = GetNextStateCaseReply::stay(RmadErrorCode::RequestArgsMissing, StateCase::Welcome);
        let wrapped = next_state_case_wrapper(&store, 110.0, StateCase::Welcome, reply);

        assert_eq!(wrapped, reply);
        assert_eq!(
            metrics_utils::snapshot(&store).occurred_errors,
            vec!["RMAD_ERROR_REQUEST_ARGS_MISSING".to_string()]
        );
        assert_eq!(logs::get_events(&store).len(), 1);
    }

    #[test]
    fn test_power_cycle_settles_running_time() {
        let dir = TempDir::new().unwrap();
        let store = store_with_setup(&dir, 100.0);

        let reply = GetNextStateCaseReply::stay(RmadErrorCode::ExpectReboot, StateCase::WpDisableRsu)
            .with_activity(AdditionalActivity::Reboot);
        next_state_case_wrapper(&store, 175.0, StateCase::WpDisableRsu, reply);

        let snapshot = metrics_utils::snapshot(&store);
        assert_eq!(snapshot.running_time, 75.0);
        assert_eq!(snapshot.setup_timestamp, Some(175.0));
        assert_eq!(
            snapshot.additional_activities,
            vec!["RMAD_ADDITIONAL_ACTIVITY_REBOOT".to_string()]
        );
    }

    #[test]
    fn test_negative_running_time_fails_transition() {
        let dir = TempDir::new().unwrap();
        let store = store_with_setup(&dir, 100.0);

        let reply = GetNextStateCaseReply::next(StateCase::UpdateDeviceInfo)
            .with_activity(AdditionalActivity::Reboot);
        let wrapped = next_state_case_wrapper(&store, 50.0, StateCase::UpdateRoFirmware, reply);

        assert_eq!(wrapped.error, RmadErrorCode::TransitionFailed);
        assert_eq!(wrapped.state_case, StateCase::UpdateRoFirmware);
        let running_time: Option<f64> = metrics_utils::get_metrics_value(&store, keys::RUNNING_TIME);
        assert_eq!(running_time, None);
    }

    #[test]
    fn test_write_failure_reports_cannot_write() {
        let mut writer = MockDocumentWriter::new();
        writer
            .expect_write()
            .returning(|_, _| Err(crate::store::StoreError::ReadOnly));
        let store = JsonStore::open_with_writer(PathBuf::from("/nonexistent/rmad/state"), Box::new(writer));

        let reply = GetNextStateCaseReply::stay(RmadErrorCode::RequestInvalid, StateCase::Welcome);
        let wrapped = next_state_case_wrapper(&store, 10.0, StateCase::Welcome, reply);

        assert_eq!(wrapped.error, RmadErrorCode::CannotWrite);
        assert!(store.read_only());
    }
}
