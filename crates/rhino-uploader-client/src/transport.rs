//! Transport abstraction between the upload flow and HTTP.
//!
//! `UploadClient` only sees this trait, so the flow can run against the real
//! backend (`HttpTransport`) or an in-memory fake.

use async_trait::async_trait;
use rhino_uploader_core::error::TransportError;
use rhino_uploader_core::{
    ConfirmRequest, ConfirmResponse, GrantRequest, PresignedGrant, UploadFile, UploaderConfig,
};
use std::sync::Arc;

use crate::ApiClient;

/// Receives raw byte counts while a transfer is in flight.
pub trait TransferObserver: Send + Sync {
    /// `loaded` is cumulative; `total` is `None` when the transport cannot tell.
    fn on_tick(&self, loaded: u64, total: Option<u64>);
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Obtain a presigned URL for the described file.
    async fn request_grant(&self, request: &GrantRequest)
        -> Result<PresignedGrant, TransportError>;

    /// Send the file bytes to the granted URL.
    async fn transfer(
        &self,
        grant: &PresignedGrant,
        file: &UploadFile,
        observer: &dyn TransferObserver,
    ) -> Result<(), TransportError>;

    /// Register the finished upload with the backend.
    async fn confirm(&self, request: &ConfirmRequest) -> Result<ConfirmResponse, TransportError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn request_grant(
        &self,
        request: &GrantRequest,
    ) -> Result<PresignedGrant, TransportError> {
        (**self).request_grant(request).await
    }

    async fn transfer(
        &self,
        grant: &PresignedGrant,
        file: &UploadFile,
        observer: &dyn TransferObserver,
    ) -> Result<(), TransportError> {
        (**self).transfer(grant, file, observer).await
    }

    async fn confirm(&self, request: &ConfirmRequest) -> Result<ConfirmResponse, TransportError> {
        (**self).confirm(request).await
    }
}

/// reqwest-backed transport.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    api: ApiClient,
}

impl HttpTransport {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub fn from_config(config: &UploaderConfig) -> anyhow::Result<Self> {
        Ok(Self::new(ApiClient::from_config(config)?))
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request_grant(
        &self,
        request: &GrantRequest,
    ) -> Result<PresignedGrant, TransportError> {
        self.api.request_upload_url(request).await
    }

    async fn transfer(
        &self,
        grant: &PresignedGrant,
        file: &UploadFile,
        observer: &dyn TransferObserver,
    ) -> Result<(), TransportError> {
        self.api.put_object(&grant.upload_url, file, observer).await
    }

    async fn confirm(&self, request: &ConfirmRequest) -> Result<ConfirmResponse, TransportError> {
        self.api.confirm_upload(request).await
    }
}
