//! Single-owner request queue around the controller
//!
//! Callers hold a cloneable [`RmadServiceHandle`]; one tokio task owns the
//! [`RmadController`] and answers requests strictly in arrival order, so two
//! transitions can never interleave.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, Instrument};

use crate::clock::SystemClock;
use crate::config::RmadConfig;
use crate::controller::{
    ControllerOptions, LogReply, ResumeError, RmadController, RmadReply, SaveLogReply,
};
use crate::error::RmadErrorCode;
use crate::handlers::HandlerContext;
use crate::hardware::system::SystemOptions;
use crate::hardware::{FakeDevice, Hardware, ProcessCommandRunner};
use crate::state::RmadState;
use crate::store::JsonStore;
use crate::telemetry::{create_request_span, generate_correlation_id};

const QUEUE_DEPTH: usize = 32;

/// Requests accepted by the daemon, also the JSON-lines wire form of `serve`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum RmadCommand {
    GetCurrentState,
    TransitionNextState { state: RmadState },
    TransitionPreviousState,
    AbortRma,
    GetLog,
    SaveLog { diagnostics_log: String },
    RecordBrowserActionMetric { diagnostics: bool, os_update: bool },
}

impl RmadCommand {
    pub fn name(&self) -> &'static str {
        match self {
            RmadCommand::GetCurrentState => "get_current_state",
            RmadCommand::TransitionNextState { .. } => "transition_next_state",
            RmadCommand::TransitionPreviousState => "transition_previous_state",
            RmadCommand::AbortRma => "abort_rma",
            RmadCommand::GetLog => "get_log",
            RmadCommand::SaveLog { .. } => "save_log",
            RmadCommand::RecordBrowserActionMetric { .. } => "record_browser_action_metric",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RmadResponse {
    State(RmadReply),
    Log(LogReply),
    SaveLog(SaveLogReply),
    Status { error: RmadErrorCode },
}

impl RmadResponse {
    pub fn error(&self) -> RmadErrorCode {
        match self {
            RmadResponse::State(reply) => reply.error,
            RmadResponse::Log(reply) => reply.error,
            RmadResponse::SaveLog(reply) => reply.error,
            RmadResponse::Status { error } => *error,
        }
    }
}

#[derive(Debug)]
pub struct RmadRequest {
    pub command: RmadCommand,
    pub reply_to: oneshot::Sender<RmadResponse>,
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("rmad service has stopped")]
    Stopped,
}

/// Opens the store named by `config` and resumes (or starts) the session
pub fn build_controller(config: &RmadConfig) -> Result<RmadController, ResumeError> {
    let hardware = if config.test_mode {
        info!("Test mode: using the in-memory fake device");
        Hardware::fake(Arc::new(FakeDevice::new()))
    } else {
        Hardware::system(
            Arc::new(ProcessCommandRunner),
            SystemOptions {
                regions_database: config.regions_database.clone(),
                ..Default::default()
            },
        )
    };
    let ctx = HandlerContext {
        store: Arc::new(JsonStore::open(&config.store_path)),
        clock: Arc::new(SystemClock),
        hardware,
        working_dir: config.working_dir.clone(),
    };
    RmadController::new(
        ctx,
        ControllerOptions {
            log_output_dir: config.log_output_dir.clone(),
            metrics_dir: config.metrics_dir(),
        },
    )
}

/// Runs `command` against the controller; shared by the queue and one-shot CLI calls
pub fn dispatch(controller: &mut RmadController, command: RmadCommand) -> RmadResponse {
    match command {
        RmadCommand::GetCurrentState => RmadResponse::State(controller.get_current_state()),
        RmadCommand::TransitionNextState { state } => {
            RmadResponse::State(controller.transition_next_state(&state))
        }
        RmadCommand::TransitionPreviousState => {
            RmadResponse::State(controller.transition_previous_state())
        }
        RmadCommand::AbortRma => RmadResponse::Status {
            error: controller.abort_rma(),
        },
        RmadCommand::GetLog => RmadResponse::Log(controller.get_log()),
        RmadCommand::SaveLog { diagnostics_log } => {
            RmadResponse::SaveLog(controller.save_log(&diagnostics_log))
        }
        RmadCommand::RecordBrowserActionMetric {
            diagnostics,
            os_update,
        } => RmadResponse::Status {
            error: controller.record_browser_action_metric(diagnostics, os_update),
        },
    }
}

pub struct RmadService {
    controller: RmadController,
    receiver: mpsc::Receiver<RmadRequest>,
}

impl RmadService {
    pub fn new(controller: RmadController) -> (Self, RmadServiceHandle) {
        let (sender, receiver) = mpsc::channel(QUEUE_DEPTH);
        (
            Self {
                controller,
                receiver,
            },
            RmadServiceHandle { sender },
        )
    }

    /// Spawns the request loop; it ends once every handle is dropped
    pub fn spawn(self) -> JoinHandle<RmadController> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) -> RmadController {
        info!("rmad service started");
        while let Some(request) = self.receiver.recv().await {
            let correlation_id = generate_correlation_id();
            let span = create_request_span(request.command.name(), &correlation_id);
            let response = span.in_scope(|| dispatch(&mut self.controller, request.command));
            if request.reply_to.send(response).is_err() {
                debug!(correlation_id = %correlation_id, "Caller went away before the reply");
            }
        }
        info!("rmad service stopped");
        self.controller
    }
}

#[derive(Debug, Clone)]
pub struct RmadServiceHandle {
    sender: mpsc::Sender<RmadRequest>,
}

impl RmadServiceHandle {
    pub async fn call(&self, command: RmadCommand) -> Result<RmadResponse, ServiceError> {
        let (reply_to, reply) = oneshot::channel();
        let span = tracing::debug_span!("rmad_call", operation = command.name());
        async {
            self.sender
                .send(RmadRequest { command, reply_to })
                .await
                .map_err(|_| ServiceError::Stopped)?;
            reply.await.map_err(|_| ServiceError::Stopped)
        }
        .instrument(span)
        .await
    }

    pub async fn get_current_state(&self) -> Result<RmadResponse, ServiceError> {
        self.call(RmadCommand::GetCurrentState).await
    }

    pub async fn transition_next_state(&self, state: RmadState) -> Result<RmadResponse, ServiceError> {
        self.call(RmadCommand::TransitionNextState { state }).await
    }

    pub async fn transition_previous_state(&self) -> Result<RmadResponse, ServiceError> {
        self.call(RmadCommand::TransitionPreviousState).await
    }

    pub async fn abort_rma(&self) -> Result<RmadResponse, ServiceError> {
        self.call(RmadCommand::AbortRma).await
    }
}
