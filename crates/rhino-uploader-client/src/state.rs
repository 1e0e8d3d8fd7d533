use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one upload attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadState {
    #[default]
    Idle,
    Validating,
    RequestingGrant,
    Transferring,
    Confirming,
    Success,
    Error,
}

impl UploadState {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploadState::Idle => "idle",
            UploadState::Validating => "validating",
            UploadState::RequestingGrant => "requesting-grant",
            UploadState::Transferring => "transferring",
            UploadState::Confirming => "confirming",
            UploadState::Success => "success",
            UploadState::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, UploadState::Success | UploadState::Error)
    }

    /// An attempt is running and a new file cannot be accepted.
    pub fn is_in_flight(&self) -> bool {
        !self.is_terminal() && *self != UploadState::Idle
    }

    /// Status line a host can show for this state.
    pub fn status_message(&self) -> Option<&'static str> {
        match self {
            UploadState::Idle => None,
            UploadState::Validating | UploadState::RequestingGrant => Some("Preparing upload..."),
            UploadState::Transferring => Some("Uploading..."),
            UploadState::Confirming => Some("Finalizing upload..."),
            UploadState::Success => Some("Upload successful!"),
            UploadState::Error => Some("Upload failed. Please try again."),
        }
    }
}

impl fmt::Display for UploadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
