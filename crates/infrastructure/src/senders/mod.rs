pub mod echo;
pub mod shell;

pub use echo::EchoSender;
pub use shell::{ShellSender, CONTEXT_ENV_PREFIX};
