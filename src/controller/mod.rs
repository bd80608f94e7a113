//! Workflow controller
//!
//! The only component allowed to move `current_state` and `state_history`.
//! Every reply from a state handler passes through [`next_state_case_wrapper`]
//! exactly once before the controller decides whether to commit a transition.
//! The commit of `state_history` + `current_state` is always the last store
//! write of a successful transition.

pub mod wrapper;

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

use crate::error::RmadErrorCode;
use crate::handlers::{GetNextStateCaseReply, HandlerContext, StateHandler, StateHandlerRegistry};
use crate::logs;
use crate::metrics::{
    keys as metrics_keys, utils as metrics_utils, AdditionalActivity, FinalMetricsRecord,
    MetricsStorage, SessionOutcome,
};
use crate::state::{RmadState, StateCase};
use crate::store::{keys, ReadError};

pub use wrapper::next_state_case_wrapper;
use wrapper::metrics_error_code;

/// Fatal problems while rebuilding the workflow from the store
///
/// These are not request errors: the stored session no longer matches the
/// handler graph and usually needs a reset.
#[derive(Debug, Error)]
pub enum ResumeError {
    #[error("Store at {path} is not usable: {reason:?}")]
    StoreUnavailable { path: PathBuf, reason: ReadError },

    #[error("Unknown state id {0} in stored workflow")]
    UnknownState(i32),

    #[error("No handler registered for {0}")]
    MissingHandler(StateCase),

    #[error("Failed to initialize {state}: {error}")]
    Initialization {
        state: StateCase,
        error: RmadErrorCode,
    },

    #[error("Failed to persist the initial workflow state")]
    CannotWrite,
}

/// Reply returned by every state-changing request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RmadReply {
    pub error: RmadErrorCode,
    pub state: RmadState,
    pub can_go_back: bool,
    pub can_abort: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogReply {
    pub error: RmadErrorCode,
    pub log: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveLogReply {
    pub error: RmadErrorCode,
    pub save_path: Option<PathBuf>,
}

/// Filesystem locations the controller writes outside the state file
#[derive(Debug, Clone)]
pub struct ControllerOptions {
    /// Where `save_log` puts its text files
    pub log_output_dir: PathBuf,
    /// Where final metrics snapshots survive the deletion of the state file
    pub metrics_dir: PathBuf,
}

pub struct RmadController {
    ctx: HandlerContext,
    registry: StateHandlerRegistry,
    metrics_storage: MetricsStorage,
    log_output_dir: PathBuf,
    current_state_case: StateCase,
    state_history: Vec<StateCase>,
    initialized: HashSet<StateCase>,
    can_abort: bool,
    /// Set once the session completed or was aborted and the store is gone
    session_over: bool,
}

impl std::fmt::Debug for RmadController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RmadController")
            .field("current_state_case", &self.current_state_case)
            .field("state_history", &self.state_history)
            .field("can_abort", &self.can_abort)
            .field("session_over", &self.session_over)
            .finish_non_exhaustive()
    }
}

impl RmadController {
    /// Starts a fresh session or resumes the one recorded in the store
    pub fn new(ctx: HandlerContext, options: ControllerOptions) -> Result<Self, ResumeError> {
        if ctx.store.read_only() {
            return Err(ResumeError::StoreUnavailable {
                path: ctx.store.path().to_path_buf(),
                reason: ctx.store.read_error(),
            });
        }

        let registry = StateHandlerRegistry::new(ctx.clone());
        let mut controller = Self {
            metrics_storage: MetricsStorage::new(options.metrics_dir),
            log_output_dir: options.log_output_dir,
            ctx,
            registry,
            current_state_case: StateCase::Welcome,
            state_history: Vec::new(),
            initialized: HashSet::new(),
            can_abort: true,
            session_over: false,
        };

        if controller.ctx.store.contains_key(keys::CURRENT_STATE) {
            controller.resume()?;
        } else {
            controller.start_fresh()?;
        }
        Ok(controller)
    }

    fn start_fresh(&mut self) -> Result<(), ResumeError> {
        let now = self.ctx.now();
        let store = &self.ctx.store;
        if !metrics_utils::initialize_setup_timestamps(store, now) {
            return Err(ResumeError::CannotWrite);
        }
        if let Err(e) =
            metrics_utils::update_state_metrics_on_transition(store, StateCase::NotSet, StateCase::Welcome, now)
        {
            error!(error = %e, "Failed to open metrics for the first state");
            return Err(ResumeError::CannotWrite);
        }
        if !self.commit(StateCase::Welcome, &[]) {
            return Err(ResumeError::CannotWrite);
        }

        self.initialize_for_resume(StateCase::Welcome)?;
        self.can_abort = self.compute_can_abort();
        info!("Started a new RMA session");
        Ok(())
    }

    fn resume(&mut self) -> Result<(), ResumeError> {
        let store = &self.ctx.store;
        let current_id: i32 = store.get(keys::CURRENT_STATE).ok_or(ResumeError::UnknownState(-1))?;
        let history_ids: Vec<i32> = if store.contains_key(keys::STATE_HISTORY) {
            store.get(keys::STATE_HISTORY).ok_or(ResumeError::UnknownState(-1))?
        } else {
            Vec::new()
        };

        let to_state = |id: i32| match StateCase::from_i32(id) {
            Some(StateCase::NotSet) | None => Err(ResumeError::UnknownState(id)),
            Some(state_case) => Ok(state_case),
        };
        let current = to_state(current_id)?;
        let history = history_ids.into_iter().map(to_state).collect::<Result<Vec<_>, _>>()?;

        for state_case in history.iter().copied().chain(std::iter::once(current)) {
            self.initialize_for_resume(state_case)?;
        }
        self.current_state_case = current;
        self.state_history = history;
        self.can_abort = self.compute_can_abort();

        // Time spent powered off does not count towards the running time.
        let now = self.ctx.now();
        if !metrics_utils::set_metrics_value(&self.ctx.store, metrics_keys::SETUP_TIMESTAMP, &now) {
            warn!("Failed to reset setup timestamp on resume");
        }

        info!(
            current = %self.current_state_case,
            history_len = self.state_history.len(),
            can_abort = %self.can_abort,
            "Resumed RMA session"
        );
        Ok(())
    }

    fn initialize_for_resume(&mut self, state_case: StateCase) -> Result<(), ResumeError> {
        let handler = self
            .registry
            .get_handler_mut(state_case)
            .ok_or(ResumeError::MissingHandler(state_case))?;
        let result = handler.initialize_state();
        if !result.is_ok() {
            error!(state = %state_case, error = %result, "State failed to initialize on resume");
            return Err(ResumeError::Initialization {
                state: state_case,
                error: result,
            });
        }
        self.initialized.insert(state_case);
        Ok(())
    }

    fn compute_can_abort(&self) -> bool {
        self.state_history
            .iter()
            .chain(std::iter::once(&self.current_state_case))
            .all(|s| self.registry.get_handler(*s).is_some_and(|h| h.is_abortable()))
    }

    fn handler(&self, state_case: StateCase) -> Option<&dyn StateHandler> {
        self.registry.get_handler(state_case)
    }

    /// Writes `state_history` and `current_state` with one store write
    fn commit(&self, current: StateCase, history: &[StateCase]) -> bool {
        let history: Vec<i32> = history.iter().map(StateCase::as_i32).collect();
        self.ctx.store.set_values(vec![
            (keys::STATE_HISTORY.to_string(), json!(history)),
            (keys::CURRENT_STATE.to_string(), json!(current.as_i32())),
        ])
    }

    fn reply(&self, error: RmadErrorCode) -> RmadReply {
        let state = self
            .handler(self.current_state_case)
            .map(|h| h.state().clone())
            .unwrap_or(RmadState::NotSet);
        RmadReply {
            error,
            state,
            can_go_back: self.can_go_back(),
            can_abort: self.can_abort(),
        }
    }

    fn session_over_reply(&self) -> RmadReply {
        RmadReply {
            error: RmadErrorCode::RmaNotRequired,
            state: RmadState::NotSet,
            can_go_back: false,
            can_abort: false,
        }
    }

    pub fn current_state_case(&self) -> StateCase {
        self.current_state_case
    }

    pub fn state_history(&self) -> &[StateCase] {
        &self.state_history
    }

    pub fn is_session_over(&self) -> bool {
        self.session_over
    }

    pub fn can_abort(&self) -> bool {
        !self.session_over && self.can_abort
    }

    /// History is non-empty and neither end of the step is irreversible
    pub fn can_go_back(&self) -> bool {
        if self.session_over {
            return false;
        }
        let Some(previous) = self.state_history.last() else {
            return false;
        };
        let repeatable = |s: StateCase| self.handler(s).is_some_and(|h| h.is_repeatable());
        repeatable(self.current_state_case) && repeatable(*previous)
    }

    fn ensure_initialized(&mut self, state_case: StateCase) -> RmadErrorCode {
        if self.initialized.contains(&state_case) {
            return RmadErrorCode::Ok;
        }
        let Some(handler) = self.registry.get_handler_mut(state_case) else {
            return RmadErrorCode::StateHandlerMissing;
        };
        let result = handler.initialize_state();
        if result.is_ok() {
            self.initialized.insert(state_case);
        }
        result
    }

    #[instrument(skip(self), fields(current = %self.current_state_case))]
    pub fn get_current_state(&mut self) -> RmadReply {
        if self.session_over {
            return self.session_over_reply();
        }
        let result = self.ensure_initialized(self.current_state_case);
        self.reply(result)
    }

    #[instrument(skip(self, state), fields(current = %self.current_state_case, submitted = %state.state_case()))]
    pub fn transition_next_state(&mut self, state: &RmadState) -> RmadReply {
        if self.session_over {
            return self.session_over_reply();
        }
        let current = self.current_state_case;
        let init = self.ensure_initialized(current);
        if !init.is_ok() {
            return self.reply(init);
        }

        let decision = if state.state_case() != current {
            warn!("Submitted state does not match the current state");
            GetNextStateCaseReply::stay(RmadErrorCode::RequestInvalid, current)
        } else {
            match self.registry.get_handler_mut(current) {
                Some(handler) => handler.get_next_state_case(state),
                None => GetNextStateCaseReply::stay(RmadErrorCode::StateHandlerMissing, current),
            }
        };
        let decision = next_state_case_wrapper(&self.ctx.store, self.ctx.now(), current, decision);

        if self.completes_session(current, &decision) {
            self.complete_session();
            return RmadReply {
                error: decision.error,
                ..self.session_over_reply()
            };
        }

        let commits = matches!(
            decision.error,
            RmadErrorCode::Ok | RmadErrorCode::ExpectReboot | RmadErrorCode::ExpectShutdown
        );
        if !commits || decision.state_case == current {
            return self.reply(decision.error);
        }

        let next = decision.state_case;
        let leaving_repeatable = self.handler(current).is_some_and(|h| h.is_repeatable());
        let mut history = self.state_history.clone();
        if leaving_repeatable {
            history.push(current);
        } else {
            debug!(state = %current, "Leaving an unrepeatable state, clearing history");
            history.clear();
        }

        let result = self.move_to(current, next, history);
        if !result.is_ok() {
            return self.reply(result);
        }
        self.reply(decision.error)
    }

    #[instrument(skip(self), fields(current = %self.current_state_case))]
    pub fn transition_previous_state(&mut self) -> RmadReply {
        if self.session_over {
            return self.session_over_reply();
        }
        if !self.can_go_back() {
            debug!("Going back is not allowed here");
            return self.reply(RmadErrorCode::RequestInvalid);
        }
        let current = self.current_state_case;
        let mut history = self.state_history.clone();
        let Some(previous) = history.pop() else {
            return self.reply(RmadErrorCode::RequestInvalid);
        };

        let result = self.move_to(current, previous, history);
        self.reply(result)
    }

    /// Initializes `next`, records metrics and the transition event, then
    /// commits; in-memory state only changes after the commit succeeded
    fn move_to(&mut self, from: StateCase, next: StateCase, history: Vec<StateCase>) -> RmadErrorCode {
        let Some(handler) = self.registry.get_handler_mut(next) else {
            error!(next = %next, "No handler for next state");
            return RmadErrorCode::StateHandlerMissing;
        };
        let init = handler.initialize_state();
        if !init.is_ok() {
            warn!(next = %next, error = %init, "Next state failed to initialize");
            if let Err(e) = metrics_utils::record_occurred_error(&self.ctx.store, init) {
                warn!(error = %e, "Failed to record initialization error");
            }
            return init;
        }
        self.initialized.insert(next);

        let now = self.ctx.now();
        if let Err(e) = metrics_utils::update_state_metrics_on_transition(&self.ctx.store, from, next, now) {
            error!(error = %e, "Failed to update state metrics");
            return metrics_error_code(&e);
        }
        if !logs::record_state_transition(&self.ctx.store, now, from, next) {
            return RmadErrorCode::CannotWrite;
        }
        if !self.commit(next, &history) {
            error!(next = %next, "Failed to commit transition, staying in current state");
            return RmadErrorCode::CannotWrite;
        }

        if let Some(handler) = self.registry.get_handler_mut(from) {
            handler.cleanup_state();
        }
        self.current_state_case = next;
        self.state_history = history;
        self.can_abort = self.compute_can_abort();
        info!(from = %from, to = %next, can_abort = %self.can_abort, "State transition committed");
        RmadErrorCode::Ok
    }

    fn completes_session(&self, current: StateCase, decision: &GetNextStateCaseReply) -> bool {
        current == StateCase::RepairComplete
            && decision.state_case == StateCase::RepairComplete
            && decision.additional_activity.is_power_cycle()
            && matches!(
                decision.error,
                RmadErrorCode::ExpectReboot | RmadErrorCode::ExpectShutdown
            )
    }

    fn complete_session(&mut self) {
        let store = &self.ctx.store;
        let now = self.ctx.now();
        if !metrics_utils::set_metrics_value(store, metrics_keys::IS_COMPLETE, &true) {
            warn!("Failed to mark metrics complete");
        }
        if let Err(e) = metrics_utils::update_state_metrics_on_complete(store, self.current_state_case, now) {
            warn!(error = %e, "Failed to close state metrics on completion");
        }
        self.finish_session(SessionOutcome::Complete);
        info!("RMA session complete");
    }

    /// Copies the metrics out of the store, then deletes the store
    fn finish_session(&mut self, outcome: SessionOutcome) -> bool {
        let record = FinalMetricsRecord {
            recorded_at: self.ctx.clock.now(),
            outcome,
            metrics: metrics_utils::snapshot(&self.ctx.store),
        };
        if let Err(e) = self.metrics_storage.store_final_snapshot(&record) {
            warn!(error = %e, "Failed to store final metrics snapshot");
        }

        let deleted = self.ctx.store.clear_and_delete_file();
        for state_case in std::mem::take(&mut self.initialized) {
            if let Some(handler) = self.registry.get_handler_mut(state_case) {
                handler.cleanup_state();
            }
        }
        self.state_history.clear();
        self.current_state_case = StateCase::NotSet;
        self.can_abort = false;
        self.session_over = true;
        deleted
    }

    #[instrument(skip(self), fields(current = %self.current_state_case))]
    pub fn abort_rma(&mut self) -> RmadErrorCode {
        if self.session_over {
            return RmadErrorCode::RmaNotRequired;
        }
        if !self.can_abort {
            info!("Abort refused past the point of no return");
            return RmadErrorCode::RmaNotAbortable;
        }

        let now = self.ctx.now();
        if let Err(e) = metrics_utils::update_state_metrics_on_abort(&self.ctx.store, self.current_state_case, now) {
            warn!(error = %e, "Failed to mark state metrics aborted");
        }
        if !self.finish_session(SessionOutcome::Aborted) {
            error!("Failed to delete the store while aborting");
            return RmadErrorCode::AbortFailed;
        }
        info!("RMA aborted");
        RmadErrorCode::RmaNotRequired
    }

    pub fn get_log(&mut self) -> LogReply {
        if self.session_over {
            return LogReply {
                error: RmadErrorCode::RmaNotRequired,
                log: String::new(),
            };
        }
        let store = &self.ctx.store;
        if let Err(e) = metrics_utils::increment_get_log_count(store, self.current_state_case, self.ctx.now()) {
            warn!(error = %e, "Failed to count log request");
        }
        LogReply {
            error: RmadErrorCode::Ok,
            log: logs::generate_logs_text(store),
        }
    }

    /// Writes the journal plus the caller's diagnostics text to a new file
    #[instrument(skip(self, diagnostics_log))]
    pub fn save_log(&mut self, diagnostics_log: &str) -> SaveLogReply {
        if self.session_over {
            return SaveLogReply {
                error: RmadErrorCode::RmaNotRequired,
                save_path: None,
            };
        }
        let store = &self.ctx.store;
        let now = self.ctx.now();
        let stamp = self.ctx.clock.now().format("%Y%m%d-%H%M%S%.3f").to_string();
        let mut path = self.log_output_dir.join(format!("rma-logs-{stamp}.txt"));
        let mut suffix = 1;
        while path.exists() {
            path = self.log_output_dir.join(format!("rma-logs-{stamp}-{suffix}.txt"));
            suffix += 1;
        }

        let mut content = logs::generate_logs_text(store);
        if !diagnostics_log.is_empty() {
            content.push_str("\n--- Diagnostics ---\n");
            content.push_str(diagnostics_log);
            content.push('\n');
        }
        let written = fs::create_dir_all(&self.log_output_dir).and_then(|()| fs::write(&path, content));
        if let Err(e) = written {
            error!(path = ?path, error = %e, "Failed to save logs");
            return SaveLogReply {
                error: RmadErrorCode::CannotSaveLog,
                save_path: None,
            };
        }

        if let Err(e) = metrics_utils::increment_save_log_count(store, self.current_state_case, now) {
            warn!(error = %e, "Failed to count saved log");
        }
        if !logs::record_saved_log(store, now, self.current_state_case, &path.to_string_lossy()) {
            warn!(path = ?path, "Failed to record saved log event");
        }
        info!(path = ?path, "Logs saved");
        SaveLogReply {
            error: RmadErrorCode::Ok,
            save_path: Some(path),
        }
    }

    pub fn record_browser_action_metric(&mut self, diagnostics: bool, os_update: bool) -> RmadErrorCode {
        if self.session_over {
            return RmadErrorCode::RmaNotRequired;
        }
        let store = &self.ctx.store;
        let now = self.ctx.now();
        let actions = [
            (diagnostics, AdditionalActivity::Diagnostics),
            (os_update, AdditionalActivity::OsUpdate),
        ];
        for (_, activity) in actions.into_iter().filter(|(requested, _)| *requested) {
            if let Err(e) = metrics_utils::record_additional_activity(store, now, activity) {
                warn!(error = %e, activity = %activity.symbol(), "Failed to record browser action");
                return RmadErrorCode::CannotRecordBrowserAction;
            }
            if !logs::record_additional_activity(store, now, self.current_state_case, activity.symbol()) {
                return RmadErrorCode::CannotRecordBrowserAction;
            }
        }
        RmadErrorCode::Ok
    }
}
