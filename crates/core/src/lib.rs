//! 可靠分发与迭代引擎的核心类型
//!
//! Errors, value objects, collaborator traits, configuration and the
//! interrupt signal shared by the dispatcher and iteration crates.

pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod shutdown;
pub mod traits;
pub mod utils;

pub use config::{
    AppConfig, ConfigValidator, DispatchConfig, IterationConfig, LinkMethod, LoggingConfig,
    SenderConfig, SenderKind, DEFAULT_MAX_CHILD_THREADS,
};
pub use errors::{RelayError, RelayResult};
pub use logging::init_logging;
pub use models::*;
pub use shutdown::{InterruptToken, ShutdownSignal};
pub use traits::*;
