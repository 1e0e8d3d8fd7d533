//! Domain methods for the upload backend and the storage PUT.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use rhino_uploader_core::constants::{
    CONFIRM_UPLOAD_ENDPOINT, RHINO_CONTENT_TYPE, UPLOAD_URL_ENDPOINT,
};
use rhino_uploader_core::error::TransportError;
use rhino_uploader_core::{
    ConfirmRequest, ConfirmResponse, FileContent, GrantRequest, PresignedGrant, UploadFile,
};
use std::pin::Pin;
use tokio::sync::mpsc;
use tokio_util::io::ReaderStream;
use validator::Validate;

use crate::transport::TransferObserver;
use crate::{error_for_status, request_error, ApiClient};

/// Body chunk size; also the progress granularity.
const CHUNK_SIZE: usize = 64 * 1024;

type ChunkStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send + Sync>>;

impl ApiClient {
    /// Ask the backend for a presigned PUT URL.
    #[tracing::instrument(skip(self, request), fields(filename = %request.filename, size = request.size))]
    pub async fn request_upload_url(
        &self,
        request: &GrantRequest,
    ) -> Result<PresignedGrant, TransportError> {
        request.validate()?;
        let grant: PresignedGrant = self.post_json(UPLOAD_URL_ENDPOINT, request).await?;
        grant.validate()?;

        tracing::debug!(file_id = %grant.file_id, "Presigned upload URL issued");
        Ok(grant)
    }

    /// Tell the backend the bytes are in storage.
    #[tracing::instrument(skip(self, request), fields(file_id = %request.file_id, file_key = %request.file_key))]
    pub async fn confirm_upload(
        &self,
        request: &ConfirmRequest,
    ) -> Result<ConfirmResponse, TransportError> {
        self.post_json(CONFIRM_UPLOAD_ENDPOINT, request).await
    }

    /// PUT the file bytes to a presigned URL, streaming the body in chunks and
    /// reporting cumulative bytes sent to `observer`.
    ///
    /// Ticks are delivered on the calling task, in order, and all of them
    /// before this returns.
    #[tracing::instrument(skip(self, upload_url, file, observer), fields(filename = %file.name, size = file.size_bytes))]
    pub async fn put_object(
        &self,
        upload_url: &str,
        file: &UploadFile,
        observer: &dyn TransferObserver,
    ) -> Result<(), TransportError> {
        let chunks = open_chunks(&file.content).await?;

        let (tx, mut rx) = mpsc::unbounded_channel::<u64>();
        let mut sent: u64 = 0;
        let counted = chunks.map(move |chunk| {
            if let Ok(bytes) = &chunk {
                sent += bytes.len() as u64;
                let _ = tx.send(sent);
            }
            chunk
        });

        // Storage authenticates through the URL signature; no backend auth here.
        let request = self
            .client()
            .put(upload_url)
            .header(CONTENT_TYPE, RHINO_CONTENT_TYPE)
            .header(CONTENT_LENGTH, file.size_bytes)
            .body(reqwest::Body::wrap_stream(counted))
            .send();
        tokio::pin!(request);

        let total = Some(file.size_bytes);
        let result = loop {
            tokio::select! {
                biased;
                Some(loaded) = rx.recv() => observer.on_tick(loaded, total),
                result = &mut request => break result,
            }
        };
        while let Ok(loaded) = rx.try_recv() {
            observer.on_tick(loaded, total);
        }

        let response = result.map_err(request_error)?;
        error_for_status(response).await?;

        tracing::debug!("Storage accepted upload");
        Ok(())
    }
}

async fn open_chunks(content: &FileContent) -> Result<ChunkStream, TransportError> {
    match content {
        FileContent::Bytes(data) => {
            let data = data.clone();
            let chunks: Vec<std::io::Result<Bytes>> = (0..data.len())
                .step_by(CHUNK_SIZE)
                .map(|start| Ok(data.slice(start..(start + CHUNK_SIZE).min(data.len()))))
                .collect();
            Ok(Box::pin(futures::stream::iter(chunks)))
        }
        FileContent::Path(path) => {
            let file = tokio::fs::File::open(path).await?;
            Ok(Box::pin(ReaderStream::with_capacity(file, CHUNK_SIZE)))
        }
    }
}
