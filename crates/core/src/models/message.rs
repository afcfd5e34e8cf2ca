use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Context key holding the message id assigned to a request.
pub const MESSAGE_ID_KEY: &str = "messageId";
/// Context key holding the externally supplied correlation id.
pub const CORRELATION_ID_KEY: &str = "correlationId";

/// 分发上下文（键值对）
///
/// Carries the message id, an optional correlation id and any caller
/// supplied values. Transformers receive the values as parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchContext {
    values: HashMap<String, String>,
}

impl DispatchContext {
    /// 创建带有新消息ID的上下文
    pub fn new() -> Self {
        let mut values = HashMap::new();
        values.insert(MESSAGE_ID_KEY.to_string(), Uuid::new_v4().to_string());
        Self { values }
    }

    pub fn with_correlation_id(mut self, correlation_id: impl Into<String>) -> Self {
        self.values
            .insert(CORRELATION_ID_KEY.to_string(), correlation_id.into());
        self
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn message_id(&self) -> Option<&str> {
        self.get(MESSAGE_ID_KEY)
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.get(CORRELATION_ID_KEY)
    }

    pub fn values(&self) -> &HashMap<String, String> {
        &self.values
    }

    /// Copy of this context with a fresh message id, used for each item of an iteration.
    pub fn derive(&self) -> Self {
        let mut values = self.values.clone();
        values.insert(MESSAGE_ID_KEY.to_string(), Uuid::new_v4().to_string());
        Self { values }
    }
}

/// 一次逻辑分发的请求
///
/// Owned by exactly one in-flight dispatch and never mutated once it has
/// been handed to a sender.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    payload: String,
    context: DispatchContext,
    correlation_hint: Option<String>,
}

impl DispatchRequest {
    pub fn new(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            context: DispatchContext::new(),
            correlation_hint: None,
        }
    }

    pub fn with_context(mut self, context: DispatchContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_correlation_hint(mut self, hint: impl Into<String>) -> Self {
        self.correlation_hint = Some(hint.into());
        self
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn context(&self) -> &DispatchContext {
        &self.context
    }

    pub fn message_id(&self) -> Option<&str> {
        self.context.message_id()
    }

    /// The explicit hint wins over the correlation id in the context.
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_hint
            .as_deref()
            .or_else(|| self.context.correlation_id())
    }
}
