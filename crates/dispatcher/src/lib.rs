//! 可靠分发：推定超时、重试调度、应答关联与分发器

pub mod correlator;
pub mod dispatcher;
pub mod presumed_timeout;
pub mod retry_scheduler;

pub use correlator::Correlator;
pub use dispatcher::{Dispatcher, DispatcherBuilder, PRESUMED_TIMEOUT_REASON};
pub use presumed_timeout::PresumedTimeoutRegistry;
pub use retry_scheduler::{RetryScheduler, INVALID_REPLY_REASON};
