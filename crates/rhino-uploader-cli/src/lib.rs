//! Helpers for the `rhino-upload` binary.

use rhino_uploader_client::{UploadListener, UploadState};
use rhino_uploader_core::constants::BYTES_PER_MB;
use rhino_uploader_core::validation::format_size_mb;
use rhino_uploader_core::{
    validate_selection, UploadOutcome, UploadProgress, UploaderConfig, ValidationVerdict,
};
use serde::Serialize;
use std::io::Write;

/// Command-line overrides layered on top of the environment configuration.
/// Flags only ever switch features on.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_url: Option<String>,
    pub max_size_mb: Option<u64>,
    pub confirm: bool,
    pub checksum: bool,
    pub multiple: bool,
}

impl Overrides {
    pub fn apply(&self, config: &mut UploaderConfig) -> anyhow::Result<()> {
        if let Some(url) = &self.api_url {
            config.api_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(mb) = self.max_size_mb {
            config.max_file_size = mb
                .checked_mul(BYTES_PER_MB)
                .ok_or_else(|| anyhow::anyhow!("--max-size-mb must be a valid number"))?;
        }
        config.confirm_uploads |= self.confirm;
        config.compute_checksum |= self.checksum;
        config.multiple |= self.multiple;
        Ok(())
    }
}

/// One line of `upload` output.
#[derive(Debug, Serialize)]
pub struct UploadReport {
    pub file: String,
    #[serde(flatten)]
    pub outcome: UploadOutcome,
}

/// Label each outcome with the file it belongs to.
///
/// A refused selection yields one outcome for the whole batch; an aborted
/// batch yields fewer outcomes than files, paired by position.
pub fn upload_reports(
    files: &[String],
    outcomes: Vec<UploadOutcome>,
    multiple: bool,
) -> Vec<UploadReport> {
    if !validate_selection(files.len(), multiple).is_valid() {
        let batch = files.join(", ");
        return outcomes
            .into_iter()
            .map(|outcome| UploadReport {
                file: batch.clone(),
                outcome,
            })
            .collect();
    }
    files
        .iter()
        .zip(outcomes)
        .map(|(file, outcome)| UploadReport {
            file: file.clone(),
            outcome,
        })
        .collect()
}

/// One line of `validate` output.
#[derive(Debug, Serialize)]
pub struct ValidationReport {
    pub file: String,
    #[serde(flatten)]
    pub verdict: ValidationVerdict,
}

/// e.g. "Uploading... 45% (4.50MB / 10MB)"
pub fn progress_line(progress: &UploadProgress) -> String {
    format!(
        "Uploading... {}% ({}MB / {}MB)",
        progress.percentage,
        format_size_mb(progress.loaded),
        format_size_mb(progress.total)
    )
}

/// Writes status changes and progress to stderr, keeping stdout for JSON.
#[derive(Debug, Default)]
pub struct ProgressPrinter;

impl UploadListener for ProgressPrinter {
    fn on_progress(&self, progress: &UploadProgress) {
        let mut stderr = std::io::stderr().lock();
        let _ = write!(stderr, "\r{}", progress_line(progress));
        if progress.is_complete() {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();
    }

    fn on_state_change(&self, _from: UploadState, to: UploadState) {
        // Transferring is covered by the progress line
        if to == UploadState::Transferring {
            return;
        }
        if let Some(message) = to.status_message() {
            eprintln!("{}", message);
        }
    }
}

/// Initialize tracing for CLI binaries. Logs go to stderr.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}
