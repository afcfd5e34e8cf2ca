use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::validation::ConfigValidator;
use crate::models::{RetryPolicy, MAX_RETRY_INTERVAL, MIN_RETRY_INTERVAL};
use crate::{RelayError, RelayResult};

/// Which key a reply listener matches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String")]
pub enum LinkMethod {
    /// The token returned by the sender (its message id).
    #[serde(rename = "MESSAGEID")]
    MessageId,
    /// The correlation id of the original request.
    #[default]
    #[serde(rename = "CORRELATIONID")]
    CorrelationId,
}

impl FromStr for LinkMethod {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MESSAGEID" => Ok(LinkMethod::MessageId),
            "CORRELATIONID" => Ok(LinkMethod::CorrelationId),
            other => Err(RelayError::Configuration(format!(
                "linkMethod [{other}] must be one of MESSAGEID, CORRELATIONID"
            ))),
        }
    }
}

impl TryFrom<String> for LinkMethod {
    type Error = RelayError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for LinkMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkMethod::MessageId => f.write_str("MESSAGEID"),
            LinkMethod::CorrelationId => f.write_str("CORRELATIONID"),
        }
    }
}

/// 分发器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchConfig {
    /// 分发器名称，同时作为超时记录的键
    pub name: String,
    pub link_method: LinkMethod,
    /// 最大重试次数
    pub max_retries: u32,
    /// 最小重试间隔（秒）
    pub retry_min_interval: u64,
    /// 最大重试间隔（秒）
    pub retry_max_interval: u64,
    /// 推定超时间隔（秒），小于等于0表示禁用
    pub presumed_timeout_interval: i64,
    /// Test hook: a reply equal to this text counts as a timeout.
    pub time_out_on_result: Option<String>,
    /// Test hook: a reply equal to this text counts as a failure.
    pub exception_on_result: Option<String>,
    /// Text handed to the success forward when a dispatch times out.
    pub result_on_time_out: Option<String>,
    /// Replies must start with this root element when set.
    pub check_root_tag: Option<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            name: "dispatcher".to_string(),
            link_method: LinkMethod::CorrelationId,
            max_retries: 0,
            retry_min_interval: 1,
            retry_max_interval: 1,
            presumed_timeout_interval: -1,
            time_out_on_result: None,
            exception_on_result: None,
            result_on_time_out: None,
            check_root_tag: None,
        }
    }
}

impl DispatchConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Copy with the retry intervals forced into their legal range.
    pub fn normalized(&self) -> Self {
        let mut config = self.clone();
        if config.max_retries == 0 {
            return config;
        }

        if config.retry_min_interval < MIN_RETRY_INTERVAL {
            warn!(
                "dispatcher [{}] retryMinInterval [{}] should be greater than or equal to [{}], assuming the lower limit",
                config.name, config.retry_min_interval, MIN_RETRY_INTERVAL
            );
            config.retry_min_interval = MIN_RETRY_INTERVAL;
        }
        if config.retry_min_interval > MAX_RETRY_INTERVAL {
            warn!(
                "dispatcher [{}] retryMinInterval [{}] should be less than or equal to [{}], assuming the upper limit",
                config.name, config.retry_min_interval, MAX_RETRY_INTERVAL
            );
            config.retry_min_interval = MAX_RETRY_INTERVAL;
        }
        if config.retry_max_interval > MAX_RETRY_INTERVAL {
            warn!(
                "dispatcher [{}] retryMaxInterval [{}] should be less than or equal to [{}], assuming the upper limit",
                config.name, config.retry_max_interval, MAX_RETRY_INTERVAL
            );
            config.retry_max_interval = MAX_RETRY_INTERVAL;
        }
        if config.retry_max_interval < config.retry_min_interval {
            warn!(
                "dispatcher [{}] retryMaxInterval [{}] should be greater than or equal to [{}], assuming the lower limit",
                config.name, config.retry_max_interval, config.retry_min_interval
            );
            config.retry_max_interval = config.retry_min_interval;
        }

        config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            self.retry_min_interval,
            self.retry_max_interval,
        )
    }

    pub fn presumed_timeout_enabled(&self) -> bool {
        self.presumed_timeout_interval > 0
    }
}

impl ConfigValidator for DispatchConfig {
    fn validate(&self) -> RelayResult<()> {
        if self.name.trim().is_empty() {
            return Err(RelayError::Configuration(
                "dispatcher name must not be empty".to_string(),
            ));
        }
        if let Some(tag) = &self.check_root_tag {
            if tag.trim().is_empty() || tag.contains(char::is_whitespace) {
                return Err(RelayError::Configuration(format!(
                    "checkRootTag [{tag}] is not a valid element name"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_link_method_parsing() {
        assert_eq!("MESSAGEID".parse::<LinkMethod>().unwrap(), LinkMethod::MessageId);
        assert_eq!(
            "correlationId".parse::<LinkMethod>().unwrap(),
            LinkMethod::CorrelationId
        );
        let error = "REPLYTO".parse::<LinkMethod>().unwrap_err();
        assert!(matches!(error, RelayError::Configuration(_)));
    }

    #[test]
    fn test_default_link_method_is_correlation_id() {
        assert_eq!(DispatchConfig::default().link_method, LinkMethod::CorrelationId);
    }

    #[test]
    fn test_normalized_clamps_intervals() {
        let config = DispatchConfig {
            max_retries: 3,
            retry_min_interval: 0,
            retry_max_interval: 1200,
            ..DispatchConfig::default()
        }
        .normalized();
        assert_eq!(config.retry_min_interval, 1);
        assert_eq!(config.retry_max_interval, 600);

        let inverted = DispatchConfig {
            max_retries: 1,
            retry_min_interval: 30,
            retry_max_interval: 10,
            ..DispatchConfig::default()
        }
        .normalized();
        assert_eq!(inverted.retry_max_interval, 30);
    }

    #[test]
    fn test_presumed_timeout_disabled_by_default() {
        let config = DispatchConfig::default();
        assert!(!config.presumed_timeout_enabled());
        let enabled = DispatchConfig {
            presumed_timeout_interval: 10,
            ..config
        };
        assert!(enabled.presumed_timeout_enabled());
    }

    #[test]
    fn test_validation() {
        assert!(DispatchConfig::default().validate().is_ok());
        assert!(DispatchConfig::new(" ").validate().is_err());
        let bad_tag = DispatchConfig {
            check_root_tag: Some("two words".into()),
            ..DispatchConfig::default()
        };
        assert!(bad_tag.validate().is_err());
    }

    #[test]
    fn test_link_method_serde_names() {
        let json = serde_json::to_string(&LinkMethod::MessageId).unwrap();
        assert_eq!(json, "\"MESSAGEID\"");
        let parsed: LinkMethod = serde_json::from_str("\"correlationid\"").unwrap();
        assert_eq!(parsed, LinkMethod::CorrelationId);
        assert!(serde_json::from_str::<LinkMethod>("\"REPLYTO\"").is_err());
    }
}
