use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{ErrorDetails, ErrorKind, HostError};

/// Request to generate a presigned URL for direct storage upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct GrantRequest {
    /// Filename as selected by the host
    #[validate(length(
        min = 1,
        max = 255,
        message = "Filename must be between 1 and 255 characters"
    ))]
    pub filename: String,
    /// File size in bytes
    pub size: u64,
    /// Optional hex-encoded SHA-256 of the file content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

/// Response containing the presigned URL and the identifier assigned by the backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct PresignedGrant {
    /// Time-limited URL accepting a single PUT of the file bytes
    #[validate(length(min = 1, message = "upload_url must not be empty"))]
    pub upload_url: String,
    /// Durable identifier of the upload
    #[validate(length(min = 1, message = "file_id must not be empty"))]
    pub file_id: String,
    #[serde(default)]
    pub filename: String,
}

/// Request to confirm a completed direct upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmRequest {
    pub file_id: String,
    /// Storage path the file was written to
    pub file_key: String,
}

/// Response after confirming an upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmResponse {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
}

/// Terminal value of one upload attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UploadOutcome {
    Success {
        file_id: String,
    },
    Failure {
        message: String,
        kind: ErrorKind,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<ErrorDetails>,
    },
}

impl UploadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success { .. })
    }

    pub fn file_id(&self) -> Option<&str> {
        match self {
            UploadOutcome::Success { file_id } => Some(file_id),
            UploadOutcome::Failure { .. } => None,
        }
    }
}

impl From<HostError> for UploadOutcome {
    fn from(err: HostError) -> Self {
        UploadOutcome::Failure {
            kind: err.code.unwrap_or(ErrorKind::Upload),
            message: err.message,
            details: err.details,
        }
    }
}
