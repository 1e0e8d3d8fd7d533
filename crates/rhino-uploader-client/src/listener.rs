//! Host-facing callbacks.
//!
//! Every method has a no-op default, so a host implements only what it shows.
//! `Callbacks` covers the common case of registering a few closures.

use rhino_uploader_core::{HostError, UploadProgress};
use std::sync::Arc;

use crate::state::UploadState;

pub trait UploadListener: Send + Sync {
    /// Called exactly once per successful attempt.
    fn on_upload_complete(&self, _file_id: &str) {}

    /// Called exactly once per failed attempt (validation included).
    fn on_upload_error(&self, _error: &HostError) {}

    fn on_progress(&self, _progress: &UploadProgress) {}

    fn on_state_change(&self, _from: UploadState, _to: UploadState) {}
}

/// Listener that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpListener;

impl UploadListener for NoOpListener {}

impl<L: UploadListener + ?Sized> UploadListener for Arc<L> {
    fn on_upload_complete(&self, file_id: &str) {
        (**self).on_upload_complete(file_id)
    }

    fn on_upload_error(&self, error: &HostError) {
        (**self).on_upload_error(error)
    }

    fn on_progress(&self, progress: &UploadProgress) {
        (**self).on_progress(progress)
    }

    fn on_state_change(&self, from: UploadState, to: UploadState) {
        (**self).on_state_change(from, to)
    }
}

type CompleteFn = Box<dyn Fn(&str) + Send + Sync>;
type ErrorFn = Box<dyn Fn(&HostError) + Send + Sync>;
type ProgressFn = Box<dyn Fn(&UploadProgress) + Send + Sync>;
type StateFn = Box<dyn Fn(UploadState, UploadState) + Send + Sync>;

/// Closure-based listener.
#[derive(Default)]
pub struct Callbacks {
    on_complete: Option<CompleteFn>,
    on_error: Option<ErrorFn>,
    on_progress: Option<ProgressFn>,
    on_state_change: Option<StateFn>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_complete(mut self, f: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.on_complete = Some(Box::new(f));
        self
    }

    pub fn with_error(mut self, f: impl Fn(&HostError) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn with_progress(mut self, f: impl Fn(&UploadProgress) + Send + Sync + 'static) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    pub fn with_state_change(
        mut self,
        f: impl Fn(UploadState, UploadState) + Send + Sync + 'static,
    ) -> Self {
        self.on_state_change = Some(Box::new(f));
        self
    }
}

impl UploadListener for Callbacks {
    fn on_upload_complete(&self, file_id: &str) {
        if let Some(f) = &self.on_complete {
            f(file_id)
        }
    }

    fn on_upload_error(&self, error: &HostError) {
        if let Some(f) = &self.on_error {
            f(error)
        }
    }

    fn on_progress(&self, progress: &UploadProgress) {
        if let Some(f) = &self.on_progress {
            f(progress)
        }
    }

    fn on_state_change(&self, from: UploadState, to: UploadState) {
        if let Some(f) = &self.on_state_change {
            f(from, to)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn unregistered_callbacks_are_skipped() {
        let completed = Arc::new(Mutex::new(Vec::new()));
        let sink = completed.clone();
        let callbacks =
            Callbacks::new().with_complete(move |id| sink.lock().unwrap().push(id.to_string()));

        callbacks.on_upload_complete("abc-123-def-456");
        callbacks.on_upload_error(&HostError::validation("nope"));
        callbacks.on_progress(&UploadProgress::default());
        callbacks.on_state_change(UploadState::Idle, UploadState::Validating);

        assert_eq!(*completed.lock().unwrap(), vec!["abc-123-def-456"]);
    }

    #[test]
    fn registered_callbacks_receive_events() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let (progress_sink, state_sink, error_sink) = (seen.clone(), seen.clone(), seen.clone());
        let callbacks = Callbacks::new()
            .with_progress(move |p| {
                progress_sink
                    .lock()
                    .unwrap()
                    .push(format!("progress {}", p.percentage))
            })
            .with_state_change(move |from, to| {
                state_sink
                    .lock()
                    .unwrap()
                    .push(format!("{} -> {}", from, to))
            })
            .with_error(move |e| error_sink.lock().unwrap().push(e.message.clone()));

        let progress = UploadProgress::compute(50, Some(100)).unwrap();
        callbacks.on_state_change(UploadState::Idle, UploadState::Validating);
        callbacks.on_progress(&progress);
        callbacks.on_upload_error(&HostError::validation("nope"));

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                format!("{} -> {}", UploadState::Idle, UploadState::Validating),
                "progress 50".to_string(),
                "nope".to_string(),
            ]
        );
    }
}
