pub mod app_config;
pub mod dispatch;
pub mod iteration;
pub mod validation;

pub use app_config::{AppConfig, LoggingConfig, SenderConfig, SenderKind};
pub use dispatch::{DispatchConfig, LinkMethod};
pub use iteration::{IterationConfig, DEFAULT_MAX_CHILD_THREADS};
pub use validation::ConfigValidator;
