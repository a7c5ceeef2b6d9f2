//! JSON-Lines Result Store
//!
//! Appends one JSON object per line: finalized outcomes to the results file,
//! archived partial sessions to the incomplete file. A single async mutex
//! serializes writers so concurrent finalizations for different calls cannot
//! interleave lines.

use anyhow::{Context, Result};
use async_trait::async_trait;
use loanline_core::record::{IncompleteRecord, ResultRecord, ResultStore};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

pub struct JsonlResultStore {
    results_path: PathBuf,
    incomplete_path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlResultStore {
    pub fn new(results_path: impl Into<PathBuf>, incomplete_path: impl Into<PathBuf>) -> Self {
        Self {
            results_path: results_path.into(),
            incomplete_path: incomplete_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn append_line(&self, path: &Path, line: &str) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("Creating record directory {:?}", parent))?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("Opening record file {:?}", path))?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ResultStore for JsonlResultStore {
    async fn append(&self, record: &ResultRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        self.append_line(&self.results_path, &line).await
    }

    async fn archive_incomplete(&self, record: &IncompleteRecord) -> Result<()> {
        let line = serde_json::to_string(record)?;
        self.append_line(&self.incomplete_path, &line).await
    }
}
