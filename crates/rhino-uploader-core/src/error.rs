//! Error types module
//!
//! This module provides the error taxonomy of the uploader. Network-level failures
//! are `TransportError`s; the upload client wraps them into `UploadError`s tagged
//! with the phase that failed; the orchestrator turns those into the `HostError`
//! value handed to the embedding application.
//!
//! Every error self-describes through `ErrorMetadata`, backed by a single static
//! table keyed on `ErrorKind`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::constants::MAX_ERROR_CHAIN_DEPTH;

/// Log level for error reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug level - for expected errors like validation failures
    Debug,
    /// Warning level - for recoverable issues like a dropped connection
    Warn,
    /// Error level - for unexpected failures
    Error,
}

/// Metadata for error reporting - defines how an error should be presented to a host
pub trait ErrorMetadata {
    /// Machine-readable error code (e.g., "VALIDATION_ERROR")
    fn error_code(&self) -> &'static str;

    /// Whether this error is recoverable (the host may re-arm and try again)
    fn is_recoverable(&self) -> bool;

    /// Suggested action for the user
    fn suggested_action(&self) -> Option<&'static str>;

    /// Host-facing message (may differ from internal error message)
    fn client_message(&self) -> String;

    /// Log level for this error
    fn log_level(&self) -> LogLevel;
}

/// Error taxonomy shared by the client, the orchestrator and the host surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Local, pre-network rejection of the candidate file
    #[serde(rename = "VALIDATION_ERROR")]
    Validation,
    /// Presigned URL could not be obtained
    #[serde(rename = "GRANT_ERROR")]
    Grant,
    /// Storage rejected the bytes or the connection failed
    #[serde(rename = "TRANSFER_ERROR")]
    Transfer,
    /// Grant or transfer failure as reported to the host
    #[serde(rename = "UPLOAD_ERROR")]
    Upload,
    /// Backend rejected the confirmation although the bytes reached storage
    #[serde(rename = "CONFIRM_ERROR")]
    Confirm,
    /// Attempt aborted by the host
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        kind_static_metadata(*self).0
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static metadata for each kind: (error_code, recoverable, suggested_action, log_level).
fn kind_static_metadata(kind: ErrorKind) -> (&'static str, bool, Option<&'static str>, LogLevel) {
    match kind {
        ErrorKind::Validation => (
            "VALIDATION_ERROR",
            true,
            Some("Select a .3dm file within the size limit"),
            LogLevel::Debug,
        ),
        ErrorKind::Grant => (
            "GRANT_ERROR",
            true,
            Some("Retry after a short delay"),
            LogLevel::Error,
        ),
        ErrorKind::Transfer => (
            "TRANSFER_ERROR",
            true,
            Some("Check your connection and upload the file again"),
            LogLevel::Warn,
        ),
        ErrorKind::Upload => (
            "UPLOAD_ERROR",
            true,
            Some("Upload the file again"),
            LogLevel::Warn,
        ),
        ErrorKind::Confirm => (
            "CONFIRM_ERROR",
            false,
            Some("The file reached storage but was not registered; contact support"),
            LogLevel::Error,
        ),
        ErrorKind::Cancelled => ("CANCELLED", true, None, LogLevel::Debug),
    }
}

/// Stable structured representation of an error's cause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Kind of the underlying failure (e.g. TRANSFER_ERROR under an UPLOAD_ERROR)
    pub kind: ErrorKind,
    pub message: String,
    /// HTTP status reported by the remote side, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Source chain, outermost first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<String>,
}

impl ErrorDetails {
    /// Build details from any error, walking its source chain.
    pub fn from_error(
        kind: ErrorKind,
        err: &(dyn std::error::Error + 'static),
        status: Option<u16>,
    ) -> Self {
        let mut causes = Vec::new();
        let mut source = err.source();
        while let Some(cause) = source {
            if causes.len() >= MAX_ERROR_CHAIN_DEPTH {
                causes.push("... (truncated)".to_string());
                break;
            }
            causes.push(cause.to_string());
            source = cause.source();
        }

        Self {
            kind,
            message: err.to_string(),
            status,
            causes,
        }
    }
}

/// Error value delivered to the host's `on_upload_error` callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<ErrorDetails>,
}

impl HostError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: Some(ErrorKind::Validation),
            details: None,
        }
    }

    /// Wrap a client failure for the host. Grant and transfer failures become
    /// UPLOAD_ERROR; confirmation and cancellation keep their own code.
    pub fn from_upload_error(err: &UploadError) -> Self {
        let code = match err.kind() {
            ErrorKind::Grant | ErrorKind::Transfer => ErrorKind::Upload,
            other => other,
        };
        Self {
            message: err.client_message(),
            code: Some(code),
            details: Some(err.details()),
        }
    }

    fn kind(&self) -> ErrorKind {
        self.code.unwrap_or(ErrorKind::Upload)
    }
}

impl fmt::Display for HostError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message)
    }
}

impl ErrorMetadata for HostError {
    fn error_code(&self) -> &'static str {
        kind_static_metadata(self.kind()).0
    }

    fn is_recoverable(&self) -> bool {
        kind_static_metadata(self.kind()).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        kind_static_metadata(self.kind()).2
    }

    fn client_message(&self) -> String {
        self.message.clone()
    }

    fn log_level(&self) -> LogLevel {
        kind_static_metadata(self.kind()).3
    }
}

/// Failure of a single HTTP exchange.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("Request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request cancelled")]
    Cancelled,
}

impl TransportError {
    /// HTTP status of the failed exchange, when the server answered.
    pub fn status(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for TransportError {
    fn from(err: serde_json::Error) -> Self {
        TransportError::InvalidResponse(format!("JSON parsing error: {}", err))
    }
}

impl From<validator::ValidationErrors> for TransportError {
    fn from(err: validator::ValidationErrors) -> Self {
        TransportError::InvalidResponse(format!("Validation error: {}", err))
    }
}

/// Failure of one upload attempt, tagged with the phase that failed.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("Failed to obtain upload URL: {0}")]
    Grant(#[source] TransportError),

    #[error("Failed to transfer file to storage: {0}")]
    Transfer(#[source] TransportError),

    #[error("Upload confirmation failed: {message}")]
    Confirm {
        message: String,
        #[source]
        source: Option<TransportError>,
    },

    #[error("Upload cancelled")]
    Cancelled,
}

impl UploadError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UploadError::Grant(_) => ErrorKind::Grant,
            UploadError::Transfer(_) => ErrorKind::Transfer,
            UploadError::Confirm { .. } => ErrorKind::Confirm,
            UploadError::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            UploadError::Grant(e) | UploadError::Transfer(e) => e.status(),
            UploadError::Confirm {
                source: Some(e), ..
            } => e.status(),
            _ => None,
        }
    }

    pub fn details(&self) -> ErrorDetails {
        ErrorDetails::from_error(self.kind(), self, self.status())
    }

    /// Get detailed error information including error chain
    pub fn detailed_message(&self) -> String {
        let details = self.details();
        let mut out = details.message;
        for cause in details.causes {
            out.push_str(&format!("\n  Caused by: {}", cause));
        }
        out
    }
}

impl ErrorMetadata for UploadError {
    fn error_code(&self) -> &'static str {
        kind_static_metadata(self.kind()).0
    }

    fn is_recoverable(&self) -> bool {
        kind_static_metadata(self.kind()).1
    }

    fn suggested_action(&self) -> Option<&'static str> {
        kind_static_metadata(self.kind()).2
    }

    fn client_message(&self) -> String {
        match self {
            UploadError::Grant(_) => "Failed to prepare upload".to_string(),
            UploadError::Transfer(TransportError::Status { status, .. }) => {
                format!("Storage rejected the upload (HTTP {})", status)
            }
            UploadError::Transfer(_) => "Failed to upload file to storage".to_string(),
            UploadError::Confirm { message, .. } => message.clone(),
            UploadError::Cancelled => "Upload cancelled".to_string(),
        }
    }

    fn log_level(&self) -> LogLevel {
        kind_static_metadata(self.kind()).3
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_codes() {
        assert_eq!(ErrorKind::Validation.as_str(), "VALIDATION_ERROR");
        assert_eq!(ErrorKind::Upload.to_string(), "UPLOAD_ERROR");
        assert_eq!(
            serde_json::to_value(ErrorKind::Confirm).unwrap(),
            serde_json::json!("CONFIRM_ERROR")
        );
        let parsed: ErrorKind = serde_json::from_str("\"TRANSFER_ERROR\"").unwrap();
        assert_eq!(parsed, ErrorKind::Transfer);
    }

    #[test]
    fn test_transfer_failure_wraps_as_upload_error() {
        let err = UploadError::Transfer(TransportError::Request(
            "connection reset by peer".to_string(),
        ));
        let host = HostError::from_upload_error(&err);

        assert_eq!(host.code, Some(ErrorKind::Upload));
        let details = host.details.unwrap();
        assert_eq!(details.kind, ErrorKind::Transfer);
        assert!(details.message.contains("connection reset by peer"));
        assert!(details
            .causes
            .iter()
            .any(|c| c.contains("connection reset by peer")));
    }

    #[test]
    fn test_confirm_failure_keeps_its_code() {
        let err = UploadError::Confirm {
            message: "File not found in storage: uploads/abc/model.3dm".to_string(),
            source: Some(TransportError::Status {
                status: 404,
                body: "not found".to_string(),
            }),
        };
        let host = HostError::from_upload_error(&err);

        assert_eq!(host.code, Some(ErrorKind::Confirm));
        assert_eq!(host.details.as_ref().and_then(|d| d.status), Some(404));
        assert!(!host.is_recoverable());
        assert_eq!(host.log_level(), LogLevel::Error);
    }

    #[test]
    fn test_error_metadata_status_message() {
        let err = UploadError::Transfer(TransportError::Status {
            status: 403,
            body: "SignatureDoesNotMatch".to_string(),
        });
        assert_eq!(err.error_code(), "TRANSFER_ERROR");
        assert_eq!(err.status(), Some(403));
        assert!(err.client_message().contains("403"));
        assert!(err.is_recoverable());
        assert!(err.detailed_message().contains("Caused by"));
    }

    #[test]
    fn test_validation_host_error_serialization() {
        let host = HostError::validation("Invalid file type. Only .3dm files are accepted.");
        let value = serde_json::to_value(&host).unwrap();
        assert_eq!(value["code"], "VALIDATION_ERROR");
        assert!(value.get("details").is_none());
        assert_eq!(host.log_level(), LogLevel::Debug);
    }
}
