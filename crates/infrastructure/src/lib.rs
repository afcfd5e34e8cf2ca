//! 基础设施：发送器、内存队列、审计日志、监控与模板转换

pub mod audit;
pub mod monitoring;
pub mod queue;
pub mod senders;
pub mod timeout;
pub mod transform;

pub use audit::{InMemoryAuditLog, JsonLinesAuditLog};
pub use monitoring::TracingMonitoringSink;
pub use queue::{InMemoryQueue, QueueListener, QueueMessage, QueueSender};
pub use senders::{EchoSender, ShellSender, CONTEXT_ENV_PREFIX};
pub use timeout::with_timeout;
pub use transform::{TemplateTransformer, ITEM_PLACEHOLDER};
