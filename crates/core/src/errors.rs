use thiserror::Error;

/// 分发引擎错误类型定义
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("timeout: {0}")]
    Timeout(String),

    #[error("transport failure: {0}")]
    TransportFailure(String),

    #[error("content rejected: {0}")]
    ContentRejected(String),

    #[error("interrupted: {0}")]
    Interrupted(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("item {index} failed: {message}")]
    PartialItemFailure { index: usize, message: String },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("transform error: {0}")]
    Transform(String),

    #[error("audit log error: {0}")]
    AuditLog(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn timeout_error(message: impl Into<String>) -> Self {
        RelayError::Timeout(message.into())
    }

    pub fn transport_error(message: impl Into<String>) -> Self {
        RelayError::TransportFailure(message.into())
    }

    pub fn interrupted(message: impl Into<String>) -> Self {
        RelayError::Interrupted(message.into())
    }

    /// Retryable kinds are absorbed by the retry scheduler until exhaustion.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RelayError::Timeout(_)
                | RelayError::TransportFailure(_)
                | RelayError::ContentRejected(_)
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, RelayError::Timeout(_))
    }

    /// The bare message without the kind prefix, as used in inline result fragments.
    pub fn detail(&self) -> String {
        match self {
            RelayError::Timeout(msg)
            | RelayError::TransportFailure(msg)
            | RelayError::ContentRejected(msg)
            | RelayError::Interrupted(msg)
            | RelayError::MalformedInput(msg)
            | RelayError::Configuration(msg)
            | RelayError::Transform(msg)
            | RelayError::AuditLog(msg)
            | RelayError::Serialization(msg)
            | RelayError::Internal(msg) => msg.clone(),
            RelayError::PartialItemFailure { message, .. } => message.clone(),
            RelayError::Io(e) => e.to_string(),
        }
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        RelayError::Serialization(e.to_string())
    }
}

impl From<config::ConfigError> for RelayError {
    fn from(e: config::ConfigError) -> Self {
        RelayError::Configuration(e.to_string())
    }
}

/// 统一的Result类型
pub type RelayResult<T> = std::result::Result<T, RelayError>;
