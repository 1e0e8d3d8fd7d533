//! One upload attempt: grant, transfer, optional confirmation.
//!
//! Each phase maps its transport failure to the matching `UploadError`
//! variant. Every phase can be raced against a `CancellationToken`; once the
//! token fires no further progress is forwarded and the phase returns
//! `UploadError::Cancelled`.

use rhino_uploader_core::constants::DEFAULT_STORAGE_KEY_PREFIX;
use rhino_uploader_core::error::{TransportError, UploadError};
use rhino_uploader_core::keys::generate_storage_key;
use rhino_uploader_core::{
    ConfirmRequest, ConfirmResponse, GrantRequest, PresignedGrant, ProgressSink, UploadFile,
    UploadProgress, UploaderConfig,
};
use std::future::Future;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::transport::{HttpTransport, TransferObserver, Transport};

/// Flow options for an `UploadClient`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Call the confirmation endpoint after the transfer
    pub confirm: bool,
    /// Send a SHA-256 of the content with the grant request
    pub compute_checksum: bool,
    pub storage_key_prefix: String,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            confirm: false,
            compute_checksum: false,
            storage_key_prefix: DEFAULT_STORAGE_KEY_PREFIX.to_string(),
        }
    }
}

impl From<&UploaderConfig> for UploadOptions {
    fn from(config: &UploaderConfig) -> Self {
        Self {
            confirm: config.confirm_uploads,
            compute_checksum: config.compute_checksum,
            storage_key_prefix: config.storage_key_prefix.clone(),
        }
    }
}

pub struct UploadClient<T> {
    transport: T,
    options: UploadOptions,
}

impl UploadClient<HttpTransport> {
    pub fn from_config(config: &UploaderConfig) -> anyhow::Result<Self> {
        Ok(Self::new(
            HttpTransport::from_config(config)?,
            UploadOptions::from(config),
        ))
    }
}

impl<T: Transport> UploadClient<T> {
    pub fn new(transport: T, options: UploadOptions) -> Self {
        Self { transport, options }
    }

    pub fn options(&self) -> &UploadOptions {
        &self.options
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Build the grant request body for `file`, hashing it when checksums are on.
    pub async fn build_request(&self, file: &UploadFile) -> Result<GrantRequest, UploadError> {
        let checksum = if self.options.compute_checksum {
            let digest = file
                .sha256_hex()
                .await
                .map_err(|e| UploadError::Grant(TransportError::Io(e)))?;
            Some(digest)
        } else {
            None
        };

        Ok(GrantRequest {
            filename: file.name.clone(),
            size: file.size_bytes,
            checksum,
        })
    }

    pub async fn request_grant(
        &self,
        file: &UploadFile,
        cancel: &CancellationToken,
    ) -> Result<PresignedGrant, UploadError> {
        cancellable(cancel, async {
            let request = self.build_request(file).await?;
            self.transport
                .request_grant(&request)
                .await
                .map_err(UploadError::Grant)
        })
        .await
    }

    /// PUT the bytes to the granted URL. `progress` sees a monotonic sequence
    /// of updates, none of them after cancellation.
    pub async fn transfer(
        &self,
        grant: &PresignedGrant,
        file: &UploadFile,
        progress: Option<&dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<(), UploadError> {
        let forwarder = ProgressForwarder::new(progress, cancel);
        cancellable(cancel, async {
            self.transport
                .transfer(grant, file, &forwarder)
                .await
                .map_err(UploadError::Transfer)
        })
        .await
    }

    /// Register the upload with the backend. A response with `success: false`
    /// is a failure carrying the backend's message.
    pub async fn confirm(
        &self,
        grant: &PresignedGrant,
        file: &UploadFile,
        cancel: &CancellationToken,
    ) -> Result<ConfirmResponse, UploadError> {
        let filename = if grant.filename.is_empty() {
            &file.name
        } else {
            &grant.filename
        };
        let request = ConfirmRequest {
            file_id: grant.file_id.clone(),
            file_key: generate_storage_key(
                &self.options.storage_key_prefix,
                &grant.file_id,
                filename,
            ),
        };

        let response = cancellable(cancel, async {
            self.transport
                .confirm(&request)
                .await
                .map_err(|e| UploadError::Confirm {
                    message: confirm_failure_message(&e),
                    source: Some(e),
                })
        })
        .await?;

        if !response.success {
            return Err(UploadError::Confirm {
                message: response.message,
                source: None,
            });
        }
        Ok(response)
    }

    /// Run a full attempt and return the backend's file id.
    pub async fn upload(
        &self,
        file: &UploadFile,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<String, UploadError> {
        self.upload_cancellable(file, progress, &CancellationToken::new())
            .await
    }

    #[tracing::instrument(skip(self, file, progress, cancel), fields(filename = %file.name, size = file.size_bytes))]
    pub async fn upload_cancellable(
        &self,
        file: &UploadFile,
        progress: Option<&dyn ProgressSink>,
        cancel: &CancellationToken,
    ) -> Result<String, UploadError> {
        let grant = self.request_grant(file, cancel).await?;
        self.transfer(&grant, file, progress, cancel).await?;
        if self.options.confirm {
            self.confirm(&grant, file, cancel).await?;
        }

        tracing::info!(file_id = %grant.file_id, "Upload completed");
        Ok(grant.file_id)
    }
}

/// Backend detail text when the server answered, the transport error otherwise.
fn confirm_failure_message(err: &TransportError) -> String {
    match err {
        TransportError::Status { body, .. } if !body.is_empty() => body.clone(),
        other => other.to_string(),
    }
}

async fn cancellable<F, R>(cancel: &CancellationToken, fut: F) -> Result<R, UploadError>
where
    F: Future<Output = Result<R, UploadError>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(UploadError::Cancelled),
        result = fut => result,
    }
}

/// Turns transport ticks into `UploadProgress` for a sink, skipping unknown
/// totals and anything that would move progress backwards.
struct ProgressForwarder<'a> {
    sink: Option<&'a dyn ProgressSink>,
    cancel: &'a CancellationToken,
    last_loaded: Mutex<Option<u64>>,
}

impl<'a> ProgressForwarder<'a> {
    fn new(sink: Option<&'a dyn ProgressSink>, cancel: &'a CancellationToken) -> Self {
        Self {
            sink,
            cancel,
            last_loaded: Mutex::new(None),
        }
    }
}

impl TransferObserver for ProgressForwarder<'_> {
    fn on_tick(&self, loaded: u64, total: Option<u64>) {
        let Some(sink) = self.sink else {
            return;
        };
        if self.cancel.is_cancelled() {
            return;
        }
        let Some(progress) = UploadProgress::compute(loaded, total) else {
            return;
        };

        {
            let mut last = self.last_loaded.lock().unwrap_or_else(|e| e.into_inner());
            if matches!(*last, Some(previous) if progress.loaded <= previous) {
                return;
            }
            *last = Some(progress.loaded);
        }

        tracing::debug!(
            loaded = progress.loaded,
            total = progress.total,
            percentage = progress.percentage,
            "Upload progress"
        );
        sink.on_progress(progress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Arc;

    /// Transport that replays scripted ticks and answers.
    #[derive(Default)]
    struct ScriptedTransport {
        ticks: Vec<(u64, Option<u64>)>,
        transfer_status: Option<u16>,
        confirm_success: bool,
        requests: Mutex<Vec<GrantRequest>>,
        confirms: Mutex<Vec<ConfirmRequest>>,
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn request_grant(
            &self,
            request: &GrantRequest,
        ) -> Result<PresignedGrant, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            Ok(PresignedGrant {
                upload_url: "https://fake-s3.com/upload".to_string(),
                file_id: "abc-123-def-456".to_string(),
                filename: request.filename.clone(),
            })
        }

        async fn transfer(
            &self,
            _grant: &PresignedGrant,
            _file: &UploadFile,
            observer: &dyn TransferObserver,
        ) -> Result<(), TransportError> {
            for (loaded, total) in &self.ticks {
                observer.on_tick(*loaded, *total);
            }
            match self.transfer_status {
                Some(status) => Err(TransportError::Status {
                    status,
                    body: "AccessDenied".to_string(),
                }),
                None => Ok(()),
            }
        }

        async fn confirm(
            &self,
            request: &ConfirmRequest,
        ) -> Result<ConfirmResponse, TransportError> {
            self.confirms.lock().unwrap().push(request.clone());
            Ok(ConfirmResponse {
                success: self.confirm_success,
                message: if self.confirm_success {
                    "Upload confirmed successfully".to_string()
                } else {
                    "File not found in storage".to_string()
                },
                event_id: None,
                task_id: None,
            })
        }
    }

    fn recorder() -> (Arc<Mutex<Vec<UploadProgress>>>, impl Fn(UploadProgress) + Send + Sync) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        (seen, move |p: UploadProgress| sink.lock().unwrap().push(p))
    }

    #[tokio::test]
    async fn progress_is_monotonic_and_skips_unknown_totals() {
        let transport = ScriptedTransport {
            ticks: vec![
                (10, Some(100)),
                (5, None),
                (50, Some(100)),
                (40, Some(100)),
                (50, Some(100)),
                (100, Some(100)),
            ],
            ..Default::default()
        };
        let client = UploadClient::new(transport, UploadOptions::default());
        let (seen, sink) = recorder();

        let file = UploadFile::from_bytes("model.3dm", vec![0u8; 100]);
        let file_id = client.upload(&file, Some(&sink)).await.unwrap();

        assert_eq!(file_id, "abc-123-def-456");
        let percentages: Vec<u8> = seen.lock().unwrap().iter().map(|p| p.percentage).collect();
        assert_eq!(percentages, vec![10, 50, 100]);
    }

    #[tokio::test]
    async fn default_request_has_no_checksum() {
        let client = UploadClient::new(ScriptedTransport::default(), UploadOptions::default());
        let file = UploadFile::from_bytes("model.3dm", &b"abc"[..]);
        client.upload(&file, None).await.unwrap();

        let requests = client.transport().requests.lock().unwrap();
        assert_eq!(requests[0].checksum, None);
        assert_eq!(requests[0].size, 3);
    }

    #[tokio::test]
    async fn checksum_is_sent_when_enabled() {
        let options = UploadOptions {
            compute_checksum: true,
            ..UploadOptions::default()
        };
        let client = UploadClient::new(ScriptedTransport::default(), options);
        let file = UploadFile::from_bytes("model.3dm", &b"abc"[..]);
        client.upload(&file, None).await.unwrap();

        let requests = client.transport().requests.lock().unwrap();
        assert_eq!(
            requests[0].checksum.as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }

    #[tokio::test]
    async fn transfer_failure_is_transfer_error() {
        let transport = ScriptedTransport {
            transfer_status: Some(403),
            ..Default::default()
        };
        let client = UploadClient::new(transport, UploadOptions::default());
        let file = UploadFile::from_bytes("model.3dm", vec![1u8; 8]);

        let err = client.upload(&file, None).await.unwrap_err();
        assert!(matches!(err, UploadError::Transfer(_)));
        assert_eq!(err.status(), Some(403));
    }

    #[tokio::test]
    async fn confirmation_uses_storage_key() {
        let options = UploadOptions {
            confirm: true,
            ..UploadOptions::default()
        };
        let transport = ScriptedTransport {
            confirm_success: true,
            ..Default::default()
        };
        let client = UploadClient::new(transport, options);
        let file = UploadFile::from_bytes("model.3dm", vec![1u8; 8]);
        client.upload(&file, None).await.unwrap();

        let confirms = client.transport().confirms.lock().unwrap();
        assert_eq!(
            confirms[0],
            ConfirmRequest {
                file_id: "abc-123-def-456".to_string(),
                file_key: "uploads/abc-123-def-456/model.3dm".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn unsuccessful_confirmation_is_confirm_error() {
        let options = UploadOptions {
            confirm: true,
            ..UploadOptions::default()
        };
        let client = UploadClient::new(ScriptedTransport::default(), options);
        let file = UploadFile::from_bytes("model.3dm", vec![1u8; 8]);

        match client.upload(&file, None).await.unwrap_err() {
            UploadError::Confirm { message, source } => {
                assert_eq!(message, "File not found in storage");
                assert!(source.is_none());
            }
            other => panic!("expected confirm error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_grant() {
        let client = UploadClient::new(ScriptedTransport::default(), UploadOptions::default());
        let file = UploadFile::from_bytes("model.3dm", vec![1u8; 8]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = client
            .upload_cancellable(&file, None, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Cancelled));
        assert!(client.transport().requests.lock().unwrap().is_empty());
    }

    #[test]
    fn forwarder_is_silent_after_cancel() {
        let (seen, sink) = recorder();
        let cancel = CancellationToken::new();
        let forwarder = ProgressForwarder::new(Some(&sink), &cancel);

        forwarder.on_tick(1, Some(2));
        cancel.cancel();
        forwarder.on_tick(2, Some(2));

        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
