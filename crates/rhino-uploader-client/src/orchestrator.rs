//! Upload state machine driving one file at a time.
//!
//! `Idle → Validating → RequestingGrant → Transferring → [Confirming] → Success`,
//! with `Error` reachable from every non-idle state. `Success` and `Error` are
//! terminal; a new selection from either re-arms the orchestrator first.
//!
//! Every accepted selection produces exactly one outcome, reported once to the
//! listener, except for aborted attempts which end silently.

use rhino_uploader_core::error::UploadError;
use rhino_uploader_core::{
    validate, validate_selection, ErrorKind, ErrorMetadata, FileConstraints, HostError, LogLevel,
    PresignedGrant, UploadFile, UploadOutcome, UploadProgress, UploaderConfig,
};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::listener::{NoOpListener, UploadListener};
use crate::state::UploadState;
use crate::transport::{HttpTransport, Transport};
use crate::uploader::UploadClient;

/// Selection refused before any state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Uploader is disabled")]
    Disabled,

    #[error("An upload is already in progress ({0})")]
    Busy(UploadState),
}

/// Cancels whatever attempt its orchestrator is running. Cloneable and usable
/// from any task.
#[derive(Clone, Debug)]
pub struct AbortHandle {
    attempt: Arc<Mutex<CancellationToken>>,
}

impl AbortHandle {
    pub fn abort(&self) {
        self.attempt
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancel();
    }
}

pub struct UploadOrchestrator<T, L = NoOpListener> {
    client: UploadClient<T>,
    constraints: FileConstraints,
    multiple: bool,
    disabled: bool,
    listener: L,
    state: UploadState,
    grant: Option<PresignedGrant>,
    progress: Mutex<Option<UploadProgress>>,
    attempt: Arc<Mutex<CancellationToken>>,
}

impl<L: UploadListener> UploadOrchestrator<HttpTransport, L> {
    pub fn from_config(config: &UploaderConfig, listener: L) -> anyhow::Result<Self> {
        config.validate()?;
        let mut orchestrator = Self::new(
            UploadClient::from_config(config)?,
            FileConstraints::from(config),
            listener,
        );
        orchestrator.multiple = config.multiple;
        orchestrator.disabled = config.disabled;
        Ok(orchestrator)
    }
}

impl<T: Transport, L: UploadListener> UploadOrchestrator<T, L> {
    pub fn new(client: UploadClient<T>, constraints: FileConstraints, listener: L) -> Self {
        Self {
            client,
            constraints,
            multiple: false,
            disabled: false,
            listener,
            state: UploadState::Idle,
            grant: None,
            progress: Mutex::new(None),
            attempt: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    pub fn with_multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    /// Latest progress of the running transfer; cleared on success and re-arm.
    pub fn progress(&self) -> Option<UploadProgress> {
        *self.progress.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Grant of the current attempt, if one was issued.
    pub fn grant(&self) -> Option<&PresignedGrant> {
        self.grant.as_ref()
    }

    pub fn client(&self) -> &UploadClient<T> {
        &self.client
    }

    pub fn constraints(&self) -> &FileConstraints {
        &self.constraints
    }

    pub fn listener(&self) -> &L {
        &self.listener
    }

    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    pub fn abort_handle(&self) -> AbortHandle {
        AbortHandle {
            attempt: Arc::clone(&self.attempt),
        }
    }

    /// Return to `Idle` from `Idle` or a terminal state, discarding the grant
    /// and progress.
    pub fn reset(&mut self) -> Result<(), OrchestratorError> {
        if self.state.is_in_flight() {
            return Err(OrchestratorError::Busy(self.state));
        }
        self.rearm();
        Ok(())
    }

    /// Cancel the current attempt. A state left in flight by a dropped
    /// `select_file` future is moved to `Error` without notifying the host.
    /// Returns whether an attempt was in flight.
    pub fn abort(&mut self) -> bool {
        self.abort_handle().abort();
        if !self.state.is_in_flight() {
            return false;
        }
        self.end_cancelled();
        true
    }

    /// Validate and upload one file.
    ///
    /// Refused (no state change, no callback) while disabled or while another
    /// attempt is in flight. Otherwise always yields an outcome.
    pub async fn select_file(
        &mut self,
        file: UploadFile,
    ) -> Result<UploadOutcome, OrchestratorError> {
        self.ensure_accepting()?;
        if self.state.is_terminal() {
            self.rearm();
        }
        let cancel = self.begin_attempt();

        self.transition(UploadState::Validating);
        let verdict = validate(&file, &self.constraints);
        if !verdict.is_valid() {
            let message = verdict.error.unwrap_or_default();
            return Ok(self.fail(HostError::validation(message)));
        }

        self.transition(UploadState::RequestingGrant);
        let grant = match self.client.request_grant(&file, &cancel).await {
            Ok(grant) => grant,
            Err(e) => return Ok(self.fail_upload(e)),
        };
        self.grant = Some(grant.clone());

        self.transition(UploadState::Transferring);
        let transferred = {
            let listener = &self.listener;
            let progress = &self.progress;
            let sink = move |update: UploadProgress| {
                *progress.lock().unwrap_or_else(|e| e.into_inner()) = Some(update);
                listener.on_progress(&update);
            };
            self.client
                .transfer(&grant, &file, Some(&sink), &cancel)
                .await
        };
        if let Err(e) = transferred {
            return Ok(self.fail_upload(e));
        }

        if self.client.options().confirm {
            self.transition(UploadState::Confirming);
            if let Err(e) = self.client.confirm(&grant, &file, &cancel).await {
                return Ok(self.fail_upload(e));
            }
        }

        Ok(self.succeed(grant.file_id))
    }

    /// Handle a multi-file selection. More than one file without `multiple`
    /// fails validation as a whole; otherwise files run one after another and
    /// an abort stops the rest of the batch.
    pub async fn select_files(
        &mut self,
        files: Vec<UploadFile>,
    ) -> Result<Vec<UploadOutcome>, OrchestratorError> {
        self.ensure_accepting()?;

        let verdict = validate_selection(files.len(), self.multiple);
        if !verdict.is_valid() {
            if self.state.is_terminal() {
                self.rearm();
            }
            self.begin_attempt();
            self.transition(UploadState::Validating);
            let message = verdict.error.unwrap_or_default();
            return Ok(vec![self.fail(HostError::validation(message))]);
        }

        let mut outcomes = Vec::with_capacity(files.len());
        for file in files {
            let outcome = self.select_file(file).await?;
            let aborted = matches!(
                outcome,
                UploadOutcome::Failure {
                    kind: ErrorKind::Cancelled,
                    ..
                }
            );
            outcomes.push(outcome);
            if aborted {
                break;
            }
        }
        Ok(outcomes)
    }

    fn ensure_accepting(&self) -> Result<(), OrchestratorError> {
        if self.disabled {
            return Err(OrchestratorError::Disabled);
        }
        if self.state.is_in_flight() {
            return Err(OrchestratorError::Busy(self.state));
        }
        Ok(())
    }

    /// Install a fresh token for the attempt about to start.
    fn begin_attempt(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self.attempt.lock().unwrap_or_else(|e| e.into_inner()) = token.clone();
        token
    }

    fn rearm(&mut self) {
        self.grant = None;
        self.clear_progress();
        self.transition(UploadState::Idle);
    }

    fn clear_progress(&self) {
        *self.progress.lock().unwrap_or_else(|e| e.into_inner()) = None;
    }

    fn transition(&mut self, to: UploadState) {
        let from = self.state;
        if from == to {
            return;
        }
        self.state = to;
        tracing::debug!(from = %from, to = %to, "Upload state changed");
        self.listener.on_state_change(from, to);
    }

    fn succeed(&mut self, file_id: String) -> UploadOutcome {
        self.transition(UploadState::Success);
        self.clear_progress();
        tracing::info!(file_id = %file_id, "Upload succeeded");
        self.listener.on_upload_complete(&file_id);
        UploadOutcome::Success { file_id }
    }

    fn fail_upload(&mut self, err: UploadError) -> UploadOutcome {
        if matches!(err, UploadError::Cancelled) {
            return self.end_cancelled();
        }
        tracing::debug!(error = %err.detailed_message(), "Upload attempt failed");
        self.fail(HostError::from_upload_error(&err))
    }

    fn fail(&mut self, err: HostError) -> UploadOutcome {
        match err.log_level() {
            LogLevel::Debug => {
                tracing::debug!(code = err.error_code(), error = %err.message, "Upload rejected")
            }
            LogLevel::Warn => {
                tracing::warn!(code = err.error_code(), error = %err.message, "Upload failed")
            }
            LogLevel::Error => {
                tracing::error!(code = err.error_code(), error = %err.message, "Upload failed")
            }
        }
        self.transition(UploadState::Error);
        self.listener.on_upload_error(&err);
        err.into()
    }

    /// Aborted attempts bypass the listener entirely.
    fn end_cancelled(&mut self) -> UploadOutcome {
        tracing::info!(from = %self.state, "Upload aborted");
        self.state = UploadState::Error;
        let err = HostError::from_upload_error(&UploadError::Cancelled);
        err.into()
    }
}
