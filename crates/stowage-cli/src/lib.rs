use anyhow::Context;
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use stowage_storage::{AttributeRecord, StorageRouter, UploadRequest};

/// Base path used when `--base-path` is not given.
pub const DEFAULT_BASE_PATH: &str = "uploads/";

#[derive(Parser, Debug)]
#[command(name = "stowage")]
#[command(about = "Upload, resolve and delete stored files")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Upload a file and print its storage key
    Upload {
        /// File to upload; its name and extension are used for the key
        file: PathBuf,

        /// Base path for the key (default: uploads/)
        #[arg(long, value_name = "PATH")]
        base_path: Option<String>,
    },
    /// Print the URL for a storage key
    Url { key: String },
    /// Delete one or more storage keys
    Delete {
        #[arg(required = true)]
        keys: Vec<String>,
    },
    /// Delete every tracked attribute of a JSON attribute record
    Purge {
        /// JSON file holding an attribute record
        record: PathBuf,
    },
}

/// What a command did, printed as JSON.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct Outcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deleted: Option<bool>,
}

/// Run one command against the router.
pub async fn run(command: Command, router: &StorageRouter) -> anyhow::Result<Outcome> {
    tracing::debug!(mode = %router.current_mode(), ?command, "Running command");
    match command {
        Command::Upload { file, base_path } => {
            let owner = AttributeRecord::new(DEFAULT_BASE_PATH);
            let request = UploadRequest::from_file(&file)
                .await
                .with_context(|| format!("Failed to open {}", file.display()))?;
            let key = router.upload(&owner, request, base_path.as_deref()).await?;
            let url = router.resolve_url(&key)?;
            tracing::info!(file = %file.display(), key = %key, "Uploaded file");
            Ok(Outcome {
                key: Some(key),
                url: Some(url),
                deleted: None,
            })
        }
        Command::Url { key } => Ok(Outcome {
            url: Some(router.resolve_url(&key)?),
            key: Some(key),
            deleted: None,
        }),
        Command::Delete { keys } => {
            let count = keys.len();
            let deleted = router.delete_by_key(keys).await?;
            tracing::info!(keys = count, deleted, "Deleted storage keys");
            Ok(Outcome {
                deleted: Some(deleted),
                ..Outcome::default()
            })
        }
        Command::Purge { record } => {
            let raw = tokio::fs::read_to_string(&record)
                .await
                .with_context(|| format!("Failed to read {}", record.display()))?;
            let record: AttributeRecord =
                serde_json::from_str(&raw).context("Invalid attribute record")?;
            let deleted = router.delete_all_tracked(&record).await?;
            tracing::info!(deleted, "Purged tracked attributes");
            Ok(Outcome {
                deleted: Some(deleted),
                ..Outcome::default()
            })
        }
    }
}

/// Initialize tracing for the CLI binary.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}
