use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{RelayError, RelayResult};

/// 初始化日志系统
///
/// `RUST_LOG` takes precedence over `log_level`. `log_format` is `json` or `pretty`.
pub fn init_logging(log_level: &str, log_format: &str) -> RelayResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => registry
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| RelayError::Configuration(format!("初始化JSON日志格式失败: {e}"))),
        "pretty" => registry
            .with(tracing_subscriber::fmt::layer().pretty())
            .try_init()
            .map_err(|e| RelayError::Configuration(format!("初始化Pretty日志格式失败: {e}"))),
        _ => Err(RelayError::Configuration(format!(
            "不支持的日志格式: {log_format}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_format_is_rejected() {
        let result = init_logging("info", "xml");
        assert!(matches!(result, Err(RelayError::Configuration(_))));
    }
}
