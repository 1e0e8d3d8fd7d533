//! Configuration module
//!
//! Uploader options with the widget defaults (500 MB, `.3dm` only, single file),
//! plus the API endpoint and transfer behaviour. Values can be overridden from
//! `RHINO_UPLOAD_*` environment variables (a `.env` file is honoured).

use std::env;

use crate::constants::{
    BYTES_PER_MB, DEFAULT_ACCEPTED_EXTENSIONS, DEFAULT_ACCEPTED_MIME_TYPES, DEFAULT_API_BASE_URL,
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_MAX_FILE_SIZE, DEFAULT_STORAGE_KEY_PREFIX, ENV_PREFIX,
};
use crate::validation::normalize_extension;

/// Uploader configuration
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploaderConfig {
    /// Base URL of the backend exposing `/api/upload/*`
    pub api_base_url: String,
    /// Bearer token sent to the backend, if it requires one
    pub api_token: Option<String>,
    /// `X-API-Key` value, used when no bearer token is set
    pub api_key: Option<String>,
    // File constraints
    pub max_file_size: u64,
    pub accepted_extensions: Vec<String>,
    pub accepted_mime_types: Vec<String>,
    pub multiple: bool,
    pub disabled: bool,
    // Upload flow
    pub confirm_uploads: bool,
    pub compute_checksum: bool,
    pub storage_key_prefix: String,
    // HTTP client
    pub connect_timeout_secs: u64,
    /// Overall request timeout; unset means the transfer may take as long as it needs
    pub request_timeout_secs: Option<u64>,
}

impl Default for UploaderConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            api_token: None,
            api_key: None,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            accepted_extensions: DEFAULT_ACCEPTED_EXTENSIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            accepted_mime_types: DEFAULT_ACCEPTED_MIME_TYPES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            multiple: false,
            disabled: false,
            confirm_uploads: false,
            compute_checksum: false,
            storage_key_prefix: DEFAULT_STORAGE_KEY_PREFIX.to_string(),
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            request_timeout_secs: None,
        }
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(name: &str, value: &str) -> Result<bool, anyhow::Error> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow::anyhow!("{} must be a boolean, got '{}'", name, other)),
    }
}

impl UploaderConfig {
    /// Load configuration from the process environment (after reading `.env`).
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup. Unset variables
    /// keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, anyhow::Error>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));
        let mut config = Self::default();

        if let Some(url) = var("API_URL") {
            config.api_base_url = url.trim().trim_end_matches('/').to_string();
        }
        config.api_token = var("API_TOKEN").filter(|t| !t.trim().is_empty());
        config.api_key = var("API_KEY").filter(|k| !k.trim().is_empty());

        if let Some(mb) = var("MAX_FILE_SIZE_MB") {
            config.max_file_size = mb
                .trim()
                .parse::<u64>()
                .ok()
                .and_then(|mb| mb.checked_mul(BYTES_PER_MB))
                .ok_or_else(|| {
                    anyhow::anyhow!("{}MAX_FILE_SIZE_MB must be a valid number", ENV_PREFIX)
                })?;
        }
        if let Some(extensions) = var("ACCEPTED_EXTENSIONS") {
            config.accepted_extensions = parse_list(&extensions)
                .iter()
                .map(|e| normalize_extension(e))
                .collect();
        }
        if let Some(mime_types) = var("ACCEPTED_MIME_TYPES") {
            config.accepted_mime_types = parse_list(&mime_types);
        }
        if let Some(v) = var("MULTIPLE") {
            config.multiple = parse_bool("MULTIPLE", &v)?;
        }
        if let Some(v) = var("DISABLED") {
            config.disabled = parse_bool("DISABLED", &v)?;
        }
        if let Some(v) = var("CONFIRM") {
            config.confirm_uploads = parse_bool("CONFIRM", &v)?;
        }
        if let Some(v) = var("CHECKSUM") {
            config.compute_checksum = parse_bool("CHECKSUM", &v)?;
        }
        if let Some(prefix) = var("STORAGE_KEY_PREFIX") {
            config.storage_key_prefix = prefix.trim().to_string();
        }
        if let Some(secs) = var("CONNECT_TIMEOUT_SECS") {
            config.connect_timeout_secs = secs.trim().parse().map_err(|_| {
                anyhow::anyhow!("{}CONNECT_TIMEOUT_SECS must be a valid number", ENV_PREFIX)
            })?;
        }
        if let Some(secs) = var("REQUEST_TIMEOUT_SECS") {
            config.request_timeout_secs = Some(secs.trim().parse().map_err(|_| {
                anyhow::anyhow!("{}REQUEST_TIMEOUT_SECS must be a valid number", ENV_PREFIX)
            })?);
        }

        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://"))
        {
            return Err(anyhow::anyhow!(
                "API base URL must start with http:// or https:// (got '{}')",
                self.api_base_url
            ));
        }

        if self.max_file_size == 0 {
            return Err(anyhow::anyhow!("Maximum file size must be greater than zero"));
        }

        if self
            .accepted_extensions
            .iter()
            .all(|e| normalize_extension(e).is_empty())
        {
            return Err(anyhow::anyhow!(
                "At least one accepted file extension must be configured"
            ));
        }

        if self.connect_timeout_secs == 0 {
            return Err(anyhow::anyhow!("Connect timeout must be greater than zero"));
        }

        Ok(())
    }
}
