//! Run ledger
//!
//! Appends one JSON line per run event to `envboot-runs.log` in the cache
//! directory, so the step that broke a run can be found after the fact even
//! when console output is gone.

use crate::config::Config;
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

/// Ledger file name inside the cache directory
pub const LEDGER_FILE: &str = "envboot-runs.log";

/// Past this size the ledger is rotated to `envboot-runs.log.1`
pub const LEDGER_MAX_BYTES: u64 = 4 * 1024 * 1024;

/// File-based run ledger that appends JSON lines
pub struct RunLedger {
    enabled: bool,
    path: PathBuf,
    max_bytes: u64,
    run_id: Uuid,
}

impl RunLedger {
    /// Create a ledger for a new run
    pub fn new(config: &Config, cache_dir: &Path) -> Self {
        Self {
            enabled: config.general.run_ledger,
            path: cache_dir.join(LEDGER_FILE),
            max_bytes: LEDGER_MAX_BYTES,
            run_id: Uuid::new_v4(),
        }
    }

    /// Ledger that records nothing
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            path: PathBuf::new(),
            max_bytes: LEDGER_MAX_BYTES,
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Record an event.
    ///
    /// Write failures are logged and dropped; the ledger never fails a run.
    pub async fn log(&self, event: &str, data: &serde_json::Value) {
        if !self.enabled {
            return;
        }

        let entry = serde_json::json!({
            "timestamp": Utc::now().to_rfc3339(),
            "run_id": self.run_id.to_string(),
            "event": event,
            "data": data,
        });

        let mut line = match serde_json::to_string(&entry) {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize ledger event: {}", e);
                return;
            }
        };
        line.push('\n');

        if let Err(e) = self.append(&line).await {
            warn!("Failed to write run ledger {}: {}", self.path.display(), e);
        }
    }

    async fn append(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        self.rotate_if_full().await?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;

        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// The cache outlives every run; keep one previous file and start over
    async fn rotate_if_full(&self) -> std::io::Result<()> {
        let len = match tokio::fs::metadata(&self.path).await {
            Ok(meta) => meta.len(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        if len < self.max_bytes {
            return Ok(());
        }

        let mut rotated = self.path.clone().into_os_string();
        rotated.push(".1");
        debug!("Rotating run ledger {} ({} bytes)", self.path.display(), len);
        tokio::fs::rename(&self.path, PathBuf::from(rotated)).await
    }
}
