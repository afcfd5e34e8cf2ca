use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use relay_core::ExitState;
use tokio::time::Instant;
use tracing::debug;

/// 推定超时记录
#[derive(Debug, Default)]
struct PresumedTimeoutRecord {
    last_timeout: Option<Instant>,
    timeout_pending: bool,
}

/// Process-wide registry of the last timeout per dispatcher name.
///
/// Shared by reference between all dispatchers. Each name has its own lock,
/// so dispatchers with different names never contend.
#[derive(Debug, Default)]
pub struct PresumedTimeoutRegistry {
    records: RwLock<HashMap<String, Arc<Mutex<PresumedTimeoutRecord>>>>,
}

impl PresumedTimeoutRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, name: &str) -> Arc<Mutex<PresumedTimeoutRecord>> {
        if let Some(record) = self
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Arc::clone(record);
        }
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(records.entry(name.to_string()).or_default())
    }

    /// True when `name` timed out less than `interval` ago.
    pub fn is_presumed_timeout(&self, name: &str, interval: Duration) -> bool {
        let record = self.record(name);
        let record = record.lock().unwrap_or_else(PoisonError::into_inner);
        match record.last_timeout {
            Some(at) => at.elapsed() < interval,
            None => false,
        }
    }

    /// Records the exit state of one physical attempt.
    ///
    /// A timeout stamps the current time, any other real exit clears the
    /// stamp. Presumed timeouts leave the record untouched.
    pub fn record_exit(&self, name: &str, exit_state: ExitState) {
        let record = self.record(name);
        let mut record = record.lock().unwrap_or_else(PoisonError::into_inner);
        match exit_state {
            ExitState::Timeout => {
                debug!("记录分发器 [{}] 的超时时间", name);
                record.last_timeout = Some(Instant::now());
            }
            ExitState::PresumedTimeout => {}
            _ => record.last_timeout = None,
        }
    }

    /// Marks a timeout as pending; returns whether one was already pending.
    pub fn mark_timeout_pending(&self, name: &str) -> bool {
        let record = self.record(name);
        let mut record = record.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut record.timeout_pending, true)
    }

    /// Clears a pending timeout; returns whether one was pending.
    pub fn clear_timeout_pending(&self, name: &str) -> bool {
        let record = self.record(name);
        let mut record = record.lock().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut record.timeout_pending, false)
    }

    pub fn last_timeout(&self, name: &str) -> Option<Instant> {
        let record = self.record(name);
        let record = record.lock().unwrap_or_else(PoisonError::into_inner);
        record.last_timeout
    }
}
