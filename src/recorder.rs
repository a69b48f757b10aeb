// ===============================
// src/recorder.rs
// ===============================
//
// Error log JSONL:
// - satu baris per error fatal: {"ts","context","message"}
// - append, parent directory dibuat otomatis
//
use chrono::Utc;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
};
use tracing::debug;

#[derive(Debug, Serialize)]
struct ErrorEntry<'a> {
    ts: String,
    context: &'a str,
    message: &'a str,
}

#[derive(Debug, Clone)]
pub struct ErrorLog {
    path: PathBuf,
}

impl ErrorLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn record(&self, context: &str, message: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }
        let entry = ErrorEntry { ts: Utc::now().to_rfc3339(), context, message };
        let mut line = serde_json::to_string(&entry).map_err(std::io::Error::from)?;
        line.push('\n');

        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        debug!(path = %self.path.display(), context, "error recorded");
        Ok(())
    }
}
