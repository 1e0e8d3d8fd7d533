//! Rhino Uploader Core Library
//!
//! This crate provides the domain models, error types, configuration, and file
//! validation shared by the upload client and its hosts. It performs no network
//! I/O; the HTTP side lives in `rhino-uploader-client`.

pub mod config;
pub mod constants;
pub mod error;
pub mod keys;
pub mod models;
pub mod validation;

// Re-export commonly used types
pub use config::UploaderConfig;
pub use error::{ErrorDetails, ErrorKind, ErrorMetadata, HostError, LogLevel};
pub use models::{
    ConfirmRequest, ConfirmResponse, FileContent, GrantRequest, PresignedGrant, ProgressSink,
    UploadFile, UploadOutcome, UploadProgress,
};
pub use validation::{validate, validate_selection, FileConstraints, ValidationVerdict};
