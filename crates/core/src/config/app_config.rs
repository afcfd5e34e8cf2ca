use std::path::Path;

use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use super::{dispatch::DispatchConfig, iteration::IterationConfig, validation::ConfigValidator};
use crate::RelayError;

/// 发送器类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderKind {
    /// Replies with the payload itself.
    #[default]
    Echo,
    /// Pipes the payload through an external command.
    Shell,
    /// In-memory queue with a correlated reply listener.
    Queue,
}

impl std::str::FromStr for SenderKind {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "echo" => Ok(SenderKind::Echo),
            "shell" => Ok(SenderKind::Shell),
            "queue" => Ok(SenderKind::Queue),
            other => Err(RelayError::Configuration(format!(
                "不支持的发送器类型: {other}"
            ))),
        }
    }
}

/// 发送器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderConfig {
    pub kind: SenderKind,
    /// 外部命令（仅 shell 类型）
    pub command: Option<String>,
    pub args: Vec<String>,
    /// 应答等待超时（毫秒，仅 queue 类型）
    pub reply_timeout_ms: u64,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            kind: SenderKind::Echo,
            command: None,
            args: Vec::new(),
            reply_timeout_ms: 5000,
        }
    }
}

impl ConfigValidator for SenderConfig {
    fn validate(&self) -> crate::RelayResult<()> {
        if self.kind == SenderKind::Shell
            && self.command.as_deref().map_or(true, |c| c.trim().is_empty())
        {
            return Err(RelayError::Configuration(
                "shell sender requires a command".to_string(),
            ));
        }
        if self.kind == SenderKind::Queue && self.reply_timeout_ms == 0 {
            return Err(RelayError::Configuration(
                "queue sender requires a positive reply_timeout_ms".to_string(),
            ));
        }
        Ok(())
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
    /// Prometheus exporter listen address, disabled when unset.
    pub metrics_address: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
            metrics_address: None,
        }
    }
}

impl ConfigValidator for LoggingConfig {
    fn validate(&self) -> crate::RelayResult<()> {
        match self.format.as_str() {
            "json" | "pretty" => Ok(()),
            other => Err(RelayError::Configuration(format!(
                "不支持的日志格式: {other}"
            ))),
        }
    }
}

/// System configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub dispatch: DispatchConfig,
    pub iteration: IterationConfig,
    pub sender: SenderConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file and environment variables
    ///
    /// Load order:
    /// 1. Defaults
    /// 2. Config file (TOML format), when given
    /// 3. Environment variable overrides (prefix: RELAY_, nesting: `__`)
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut builder = ConfigBuilder::builder();

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        }

        builder = builder.add_source(
            Environment::with_prefix("RELAY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;

        config.validate()?;
        Ok(config)
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }

    pub fn validate(&self) -> Result<()> {
        self.dispatch.validate().context("分发器配置验证失败")?;
        self.iteration.validate().context("迭代配置验证失败")?;
        self.sender.validate().context("发送器配置验证失败")?;
        self.logging.validate().context("日志配置验证失败")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LinkMethod;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[dispatch]
name = "orders"
link_method = "MESSAGEID"
max_retries = 2
retry_min_interval = 1
retry_max_interval = 8
presumed_timeout_interval = 10

[iteration]
parallel = true
max_child_threads = 4
ignore_exceptions = true

[sender]
kind = "queue"
reply_timeout_ms = 250
"#;

    #[test]
    fn test_from_toml() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        assert_eq!(config.dispatch.name, "orders");
        assert_eq!(config.dispatch.link_method, LinkMethod::MessageId);
        assert_eq!(config.dispatch.max_retries, 2);
        assert!(config.iteration.parallel);
        assert_eq!(config.iteration.max_child_threads, 4);
        assert!(config.iteration.collect_results);
        assert_eq!(config.sender.kind, SenderKind::Queue);
        assert_eq!(config.logging.format, "pretty");
    }

    #[test]
    fn test_toml_roundtrip_keeps_values() {
        let config = AppConfig::from_toml(SAMPLE).unwrap();
        let text = config.to_toml().unwrap();
        assert_eq!(AppConfig::from_toml(&text).unwrap(), config);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::with_suffix(".toml").unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let config = AppConfig::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(config.dispatch.presumed_timeout_interval, 10);
        assert_eq!(config.sender.reply_timeout_ms, 250);
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(AppConfig::load(Some("/nonexistent/relay.toml")).is_err());
    }

    #[test]
    fn test_invalid_sections_are_rejected() {
        let shell_without_command = "[sender]\nkind = \"shell\"\n";
        assert!(AppConfig::from_toml(shell_without_command).is_err());

        let bad_window = "[iteration]\nstart_position = 4\nend_position = 2\n";
        assert!(AppConfig::from_toml(bad_window).is_err());

        let bad_link = "[dispatch]\nlink_method = \"REPLYTO\"\n";
        assert!(AppConfig::from_toml(bad_link).is_err());
    }
}
