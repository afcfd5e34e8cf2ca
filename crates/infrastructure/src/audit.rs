use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use relay_core::{AuditLog, AuditRecord, RelayError, RelayResult};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// 内存审计日志
#[derive(Debug, Default)]
pub struct InMemoryAuditLog {
    records: Mutex<Vec<AuditRecord>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AuditLog for InMemoryAuditLog {
    async fn store(&self, record: AuditRecord) -> RelayResult<()> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
        Ok(())
    }
}

/// Appends one JSON object per record to a file.
#[derive(Debug)]
pub struct JsonLinesAuditLog {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl JsonLinesAuditLog {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl AuditLog for JsonLinesAuditLog {
    async fn store(&self, record: AuditRecord) -> RelayResult<()> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| {
                RelayError::AuditLog(format!("无法打开审计日志 {}: {e}", self.path.display()))
            })?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| RelayError::AuditLog(format!("写入审计日志失败: {e}")))?;
        file.flush()
            .await
            .map_err(|e| RelayError::AuditLog(format!("写入审计日志失败: {e}")))?;
        debug!("审计记录已写入, message_id={}", record.message_id);
        Ok(())
    }
}
