use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Flat error taxonomy shared by the controller and every state handler.
///
/// Some variants are not failures at all (`Ok`, `Wait`, `ExpectReboot`,
/// `ExpectShutdown`, `RmaNotRequired`) but instructions to the caller; they
/// still travel through the same channel so a reply always carries exactly one
/// code.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RmadErrorCode {
    #[error("error code not set")]
    NotSet,
    #[error("ok")]
    Ok,
    #[error("waiting for an external condition")]
    Wait,
    #[error("device is about to reboot")]
    ExpectReboot,
    #[error("device is about to shut down")]
    ExpectShutdown,
    #[error("RMA is not required")]
    RmaNotRequired,
    #[error("no handler registered for state")]
    StateHandlerMissing,
    #[error("state handler failed to initialize")]
    StateHandlerInitializationFailed,
    #[error("request does not match the current state")]
    RequestInvalid,
    #[error("request is missing required arguments")]
    RequestArgsMissing,
    #[error("request arguments violate state constraints")]
    RequestArgsViolation,
    #[error("state transition failed")]
    TransitionFailed,
    #[error("abort failed")]
    AbortFailed,
    #[error("RMA can no longer be aborted")]
    RmaNotAbortable,
    #[error("a required component is missing")]
    MissingComponent,
    #[error("no RSU challenge code available")]
    WriteProtectDisableRsuNoChallenge,
    #[error("RSU unlock code rejected")]
    WriteProtectDisableRsuCodeInvalid,
    #[error("write protect is still enabled")]
    WpEnabled,
    #[error("cannot write persistent data")]
    CannotWrite,
    #[error("cannot read persistent data")]
    CannotRead,
    #[error("cannot generate logs")]
    CannotGetLog,
    #[error("cannot save logs")]
    CannotSaveLog,
    #[error("cannot record browser action")]
    CannotRecordBrowserAction,
    #[error("firmware update failed")]
    UpdateRoFirmwareFailed,
    #[error("device provisioning failed")]
    ProvisioningFailed,
    #[error("calibration failed")]
    CalibrationFailed,
    #[error("finalization failed")]
    FinalizationFailed,
}

impl RmadErrorCode {
    /// Symbolic name recorded in the occurred-errors audit list.
    pub fn symbol(&self) -> &'static str {
        match self {
            RmadErrorCode::NotSet => "RMAD_ERROR_NOT_SET",
            RmadErrorCode::Ok => "RMAD_ERROR_OK",
            RmadErrorCode::Wait => "RMAD_ERROR_WAIT",
            RmadErrorCode::ExpectReboot => "RMAD_ERROR_EXPECT_REBOOT",
            RmadErrorCode::ExpectShutdown => "RMAD_ERROR_EXPECT_SHUTDOWN",
            RmadErrorCode::RmaNotRequired => "RMAD_ERROR_RMA_NOT_REQUIRED",
            RmadErrorCode::StateHandlerMissing => "RMAD_ERROR_STATE_HANDLER_MISSING",
            RmadErrorCode::StateHandlerInitializationFailed => {
                "RMAD_ERROR_STATE_HANDLER_INITIALIZATION_FAILED"
            }
            RmadErrorCode::RequestInvalid => "RMAD_ERROR_REQUEST_INVALID",
            RmadErrorCode::RequestArgsMissing => "RMAD_ERROR_REQUEST_ARGS_MISSING",
            RmadErrorCode::RequestArgsViolation => "RMAD_ERROR_REQUEST_ARGS_VIOLATION",
            RmadErrorCode::TransitionFailed => "RMAD_ERROR_TRANSITION_FAILED",
            RmadErrorCode::AbortFailed => "RMAD_ERROR_ABORT_FAILED",
            RmadErrorCode::RmaNotAbortable => "RMAD_ERROR_RMA_NOT_ABORTABLE",
            RmadErrorCode::MissingComponent => "RMAD_ERROR_MISSING_COMPONENT",
            RmadErrorCode::WriteProtectDisableRsuNoChallenge => {
                "RMAD_ERROR_WRITE_PROTECT_DISABLE_RSU_NO_CHALLENGE"
            }
            RmadErrorCode::WriteProtectDisableRsuCodeInvalid => {
                "RMAD_ERROR_WRITE_PROTECT_DISABLE_RSU_CODE_INVALID"
            }
            RmadErrorCode::WpEnabled => "RMAD_ERROR_WP_ENABLED",
            RmadErrorCode::CannotWrite => "RMAD_ERROR_CANNOT_WRITE",
            RmadErrorCode::CannotRead => "RMAD_ERROR_CANNOT_READ",
            RmadErrorCode::CannotGetLog => "RMAD_ERROR_CANNOT_GET_LOG",
            RmadErrorCode::CannotSaveLog => "RMAD_ERROR_CANNOT_SAVE_LOG",
            RmadErrorCode::CannotRecordBrowserAction => {
                "RMAD_ERROR_CANNOT_RECORD_BROWSER_ACTION"
            }
            RmadErrorCode::UpdateRoFirmwareFailed => "RMAD_ERROR_UPDATE_RO_FIRMWARE_FAILED",
            RmadErrorCode::ProvisioningFailed => "RMAD_ERROR_PROVISIONING_FAILED",
            RmadErrorCode::CalibrationFailed => "RMAD_ERROR_CALIBRATION_FAILED",
            RmadErrorCode::FinalizationFailed => "RMAD_ERROR_FINALIZATION_FAILED",
        }
    }

    /// Codes that are expected outcomes and never enter the occurred-errors list.
    pub fn is_benign(&self) -> bool {
        matches!(
            self,
            RmadErrorCode::Ok
                | RmadErrorCode::Wait
                | RmadErrorCode::ExpectReboot
                | RmadErrorCode::ExpectShutdown
                | RmadErrorCode::RmaNotRequired
                | RmadErrorCode::NotSet
        )
    }

    pub fn is_ok(&self) -> bool {
        *self == RmadErrorCode::Ok
    }
}
