//! Application-wide constants.

/// Endpoint (relative to the API base URL) that issues presigned upload URLs.
pub const UPLOAD_URL_ENDPOINT: &str = "/api/upload/url";

/// Endpoint (relative to the API base URL) that confirms a finished transfer.
pub const CONFIRM_UPLOAD_ENDPOINT: &str = "/api/upload/confirm";

/// Content type sent with the raw `.3dm` bytes on the storage PUT.
pub const RHINO_CONTENT_TYPE: &str = "application/x-rhino";

pub const BYTES_PER_MB: u64 = 1024 * 1024;

/// 500 MB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 500 * BYTES_PER_MB;

pub const DEFAULT_ACCEPTED_EXTENSIONS: &[&str] = &[".3dm"];

pub const DEFAULT_ACCEPTED_MIME_TYPES: &[&str] = &["application/x-rhino", "application/octet-stream"];

/// Prefix of the storage key the backend writes uploads under:
/// `{prefix}/{file_id}/{filename}`.
pub const DEFAULT_STORAGE_KEY_PREFIX: &str = "uploads";

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Prefix for environment variables read by `UploaderConfig::from_env`.
pub const ENV_PREFIX: &str = "RHINO_UPLOAD_";

/// Longest filename, in characters, the backend accepts in a grant request.
pub const MAX_FILENAME_LENGTH: usize = 255;

pub const TOO_MANY_FILES_MESSAGE: &str = "Only one file can be uploaded at a time.";

/// Maximum depth of a source chain rendered into error details.
pub const MAX_ERROR_CHAIN_DEPTH: usize = 5;
