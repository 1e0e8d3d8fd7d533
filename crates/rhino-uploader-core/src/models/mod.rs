//! Data models for the uploader
//!
//! Wire types for the presigned upload contract, the candidate file, and the
//! transient progress/outcome values reported to hosts.

mod file;
mod progress;
pub mod upload;

// Re-export all models for convenient imports
pub use file::{FileContent, UploadFile};
pub use progress::{ProgressSink, UploadProgress};
pub use upload::{ConfirmRequest, ConfirmResponse, GrantRequest, PresignedGrant, UploadOutcome};
