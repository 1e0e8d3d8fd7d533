//! rhino-upload: validate and upload Rhino `.3dm` models through presigned URLs.
//!
//! Configuration comes from RHINO_UPLOAD_* variables (a `.env` file is read);
//! flags override it. Progress goes to stderr, JSON results to stdout.

use anyhow::Context;
use clap::{Parser, Subcommand};
use rhino_uploader_client::UploadOrchestrator;
use rhino_uploader_cli::{
    init_tracing, upload_reports, Overrides, ProgressPrinter, ValidationReport,
};
use rhino_uploader_core::{validate, FileConstraints, UploadFile, UploaderConfig};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rhino-upload", about = "Upload Rhino models through presigned URLs")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload one or more .3dm files
    Upload {
        /// Files to upload
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Confirm each upload with the backend after the transfer
        #[arg(long)]
        confirm: bool,
        /// Send a SHA-256 checksum with the upload request
        #[arg(long)]
        checksum: bool,
        /// Allow more than one file per invocation
        #[arg(long)]
        multiple: bool,
        /// Backend base URL
        #[arg(long)]
        api_url: Option<String>,
        /// Maximum file size in MB
        #[arg(long)]
        max_size_mb: Option<u64>,
    },
    /// Check files against the upload constraints without uploading
    Validate {
        /// Files to check
        #[arg(required = true)]
        files: Vec<PathBuf>,
        /// Maximum file size in MB
        #[arg(long)]
        max_size_mb: Option<u64>,
    },
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
    let out = serde_json::to_string_pretty(value).context("Serialize response")?;
    println!("{}", out);
    Ok(())
}

async fn load_file(path: &Path) -> anyhow::Result<UploadFile> {
    UploadFile::from_path(path)
        .await
        .with_context(|| format!("Failed to read file: {}", path.display()))
}

async fn upload(files: Vec<PathBuf>, config: UploaderConfig) -> anyhow::Result<usize> {
    let multiple = config.multiple;
    let mut orchestrator = UploadOrchestrator::from_config(&config, ProgressPrinter)
        .context("Failed to create uploader")?;

    let abort = orchestrator.abort_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, aborting upload");
            abort.abort();
        }
    });

    let mut selection = Vec::with_capacity(files.len());
    for path in &files {
        selection.push(load_file(path).await?);
    }

    let outcomes = orchestrator.select_files(selection).await?;
    let failures = outcomes.iter().filter(|o| !o.is_success()).count();

    let labels: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
    let reports = upload_reports(&labels, outcomes, multiple);
    print_json(&reports)?;

    Ok(failures)
}

async fn validate_files(files: Vec<PathBuf>, config: UploaderConfig) -> anyhow::Result<usize> {
    let constraints = FileConstraints::from(&config);

    let mut reports = Vec::with_capacity(files.len());
    for path in &files {
        let file = load_file(path).await?;
        reports.push(ValidationReport {
            file: path.display().to_string(),
            verdict: validate(&file, &constraints),
        });
    }
    let failures = reports.iter().filter(|r| !r.verdict.is_valid()).count();
    print_json(&reports)?;

    Ok(failures)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let mut config = UploaderConfig::from_env().context("Failed to load configuration")?;
    let cli = Cli::parse();

    let (total, failures) = match cli.command {
        Commands::Upload {
            files,
            confirm,
            checksum,
            multiple,
            api_url,
            max_size_mb,
        } => {
            Overrides {
                api_url,
                max_size_mb,
                confirm,
                checksum,
                multiple,
            }
            .apply(&mut config)?;
            let total = files.len();
            (total, upload(files, config).await?)
        }
        Commands::Validate { files, max_size_mb } => {
            Overrides {
                max_size_mb,
                ..Overrides::default()
            }
            .apply(&mut config)?;
            config.validate().context("Invalid configuration")?;
            let total = files.len();
            (total, validate_files(files, config).await?)
        }
    };

    if failures > 0 {
        anyhow::bail!("{} of {} file(s) failed", failures, total);
    }
    Ok(())
}
