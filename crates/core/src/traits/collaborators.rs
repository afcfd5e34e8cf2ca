use std::collections::HashMap;
use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::RelayResult;

/// Opaque text transformation, e.g. a stylesheet applied to an item before it is sent.
#[async_trait]
pub trait Transformer: Send + Sync {
    async fn transform(&self, text: &str, params: &HashMap<String, String>) -> RelayResult<String>;
}

/// Wraps a plain function as a [`Transformer`].
pub struct FnTransformer<F>(pub F);

#[async_trait]
impl<F> Transformer for FnTransformer<F>
where
    F: Fn(&str, &HashMap<String, String>) -> RelayResult<String> + Send + Sync,
{
    async fn transform(&self, text: &str, params: &HashMap<String, String>) -> RelayResult<String> {
        (self.0)(text, params)
    }
}

/// Opaque condition over a result text.
///
/// Used as the content-based retry signal on replies and as the stop
/// condition of an iteration.
#[async_trait]
pub trait ResultPredicate: Send + Sync {
    async fn evaluate(&self, text: &str) -> RelayResult<bool>;
}

#[async_trait]
impl<F> ResultPredicate for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    async fn evaluate(&self, text: &str) -> RelayResult<bool> {
        Ok(self(text))
    }
}

/// 审计日志记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub message_id: String,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub trail: String,
    pub label: Option<String>,
    pub payload: String,
}

/// 审计日志抽象接口
#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn store(&self, record: AuditRecord) -> RelayResult<()>;
}

/// Events a dispatcher reports to monitoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonitoringEvent {
    TimeoutOccurred,
    TimeoutCleared,
    ExceptionCaught,
}

impl MonitoringEvent {
    pub fn name(&self) -> &'static str {
        match self {
            MonitoringEvent::TimeoutOccurred => "Sender Timeout",
            MonitoringEvent::TimeoutCleared => "Sender Received Result on Time",
            MonitoringEvent::ExceptionCaught => "Sender Exception Caught",
        }
    }
}

impl fmt::Display for MonitoringEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// 监控事件接收器
pub trait MonitoringSink: Send + Sync {
    fn event(&self, source: &str, event: MonitoringEvent);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMonitoringSink;

impl MonitoringSink for NoopMonitoringSink {
    fn event(&self, _source: &str, _event: MonitoringEvent) {}
}
