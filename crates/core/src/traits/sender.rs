use std::time::Duration;

use async_trait::async_trait;

use crate::{models::DispatchContext, RelayResult};

/// 发送器抽象接口
///
/// A synchronous sender returns the reply directly. An asynchronous sender
/// returns a token (usually the message id it assigned) that has to be
/// correlated with a reply arriving on a [`Listener`].
#[async_trait]
pub trait Sender: Send + Sync {
    /// 发送器名称，可以为空
    fn name(&self) -> &str;

    /// 是否同步返回结果
    fn is_synchronous(&self) -> bool {
        true
    }

    /// 发送消息，返回结果或关联令牌
    async fn send(&self, payload: &str, context: &DispatchContext) -> RelayResult<String>;
}

/// 应答监听器抽象接口
#[async_trait]
pub trait Listener: Send + Sync {
    /// 监听器名称，可以为空
    fn name(&self) -> &str;

    /// How long a reply wait may block before timing out.
    fn timeout(&self) -> Duration;

    /// Waits for the reply tagged with `correlation_key`.
    /// Returns [`crate::RelayError::Timeout`] when nothing arrives within `timeout`.
    async fn receive(
        &self,
        correlation_key: &str,
        context: &DispatchContext,
        timeout: Duration,
    ) -> RelayResult<String>;
}
