use std::path::{Path, PathBuf};

use async_trait::async_trait;
use bastion_application::{FallbackAuditSink, SealedAuditEvent};
use bastion_core::{AppError, AppResult};
use chrono::Utc;
use serde_json::json;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Appends audit events that missed the primary store to a local JSON-lines
/// file, one record per line, for later replay.
pub struct JsonLinesFallbackSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonLinesFallbackSink {
    /// Creates a sink writing to `path`. The file is created on first write.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Target file.
    #[must_use]
    pub fn path(&self) -> &Path {
        self.path.as_path()
    }
}

#[async_trait]
impl FallbackAuditSink for JsonLinesFallbackSink {
    async fn record(&self, event: &SealedAuditEvent, failure: &str) -> AppResult<()> {
        let mut line = serde_json::to_string(&json!({
            "divertedAt": Utc::now(),
            "failure": failure,
            "event": event,
        }))
        .map_err(|error| {
            AppError::Internal(format!("failed to serialize fallback audit record: {error}"))
        })?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|error| {
                AppError::Internal(format!(
                    "failed to open audit fallback file '{}': {error}",
                    self.path.display()
                ))
            })?;
        file.write_all(line.as_bytes()).await.map_err(|error| {
            AppError::Internal(format!("failed to write audit fallback record: {error}"))
        })?;
        file.flush().await.map_err(|error| {
            AppError::Internal(format!("failed to flush audit fallback file: {error}"))
        })?;

        Ok(())
    }
}
