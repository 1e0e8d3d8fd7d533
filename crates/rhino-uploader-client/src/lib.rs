//! HTTP client and upload flow for Rhino models.
//!
//! `ApiClient` talks to the backend (presigned URL grant, confirmation) and to
//! storage (the raw PUT). `UploadClient` sequences one attempt over a
//! `Transport`; `UploadOrchestrator` wraps it in the host-facing state machine.

pub mod api;
pub mod listener;
pub mod orchestrator;
pub mod state;
pub mod transport;
pub mod uploader;

use anyhow::{Context, Result};
use reqwest::Client;
use rhino_uploader_core::error::TransportError;
use rhino_uploader_core::UploaderConfig;
use serde::de::DeserializeOwned;
use std::time::Duration;

pub use listener::{Callbacks, NoOpListener, UploadListener};
pub use orchestrator::{AbortHandle, OrchestratorError, UploadOrchestrator};
pub use state::UploadState;
pub use transport::{HttpTransport, TransferObserver, Transport};
pub use uploader::{UploadClient, UploadOptions};

/// Authentication strategy for the backend API.
#[derive(Clone, Debug)]
pub enum Auth {
    /// `Authorization: Bearer {token}`
    Bearer(String),
    /// `X-API-Key: {key}`
    XApiKey(String),
}

impl Auth {
    /// Bearer token wins over an API key when both are configured.
    pub fn from_config(config: &UploaderConfig) -> Option<Self> {
        config
            .api_token
            .clone()
            .map(Auth::Bearer)
            .or_else(|| config.api_key.clone().map(Auth::XApiKey))
    }
}

/// HTTP client for the upload backend with optional auth.
#[derive(Clone, Debug)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: Option<Auth>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, auth: Option<Auth>) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(
                rhino_uploader_core::constants::DEFAULT_CONNECT_TIMEOUT_SECS,
            ))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_client(client, base_url, auth))
    }

    /// Create client from uploader configuration. No overall timeout is applied
    /// unless `request_timeout_secs` is set, so large transfers are not cut off.
    pub fn from_config(config: &UploaderConfig) -> Result<Self> {
        let mut builder =
            Client::builder().connect_timeout(Duration::from_secs(config.connect_timeout_secs));
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().context("Failed to create HTTP client")?;

        Ok(Self::with_client(
            client,
            config.api_base_url.clone(),
            Auth::from_config(config),
        ))
    }

    fn with_client(client: Client, base_url: impl Into<String>, auth: Option<Auth>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            auth,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn apply_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.auth {
            Some(Auth::Bearer(token)) => {
                request.header("Authorization", format!("Bearer {}", token))
            }
            Some(Auth::XApiKey(key)) => request.header("X-API-Key", key.as_str()),
            None => request,
        }
    }

    /// POST JSON body to a backend path and deserialize the response.
    pub async fn post_json<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, TransportError> {
        let url = self.build_url(path);
        let request = self.client.post(&url).json(body);
        let request = self.apply_auth(request);

        let response = request.send().await.map_err(request_error)?;
        let response = error_for_status(response).await?;

        let bytes = response.bytes().await.map_err(request_error)?;
        let body: T = serde_json::from_slice(&bytes)?;

        Ok(body)
    }

    /// Raw client for requests outside the backend (the storage PUT).
    /// Backend credentials are never attached to those.
    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Flatten a reqwest error and its sources into one message, so the cause
/// (e.g. "connection refused") survives the conversion.
pub(crate) fn request_error(err: reqwest::Error) -> TransportError {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(&err);
    while let Some(cause) = source {
        let cause_text = cause.to_string();
        if !message.contains(&cause_text) {
            message.push_str(": ");
            message.push_str(&cause_text);
        }
        source = cause.source();
    }
    TransportError::Request(message)
}

/// Turn a non-2xx response into `TransportError::Status`. FastAPI-style
/// `{"detail": "..."}` bodies are reduced to the detail text.
pub(crate) async fn error_for_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    Err(TransportError::Status {
        status: status.as_u16(),
        body: extract_detail(&error_text),
    })
}

fn extract_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|value| match value.get("detail") {
            Some(serde_json::Value::String(detail)) => Some(detail.clone()),
            Some(other) if !other.is_null() => Some(other.to_string()),
            _ => None,
        })
        .unwrap_or_else(|| body.trim().to_string())
}
