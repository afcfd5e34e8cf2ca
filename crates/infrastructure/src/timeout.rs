//! Timeout handling utilities for async operations

use std::future::Future;
use std::time::Duration;

use relay_core::{RelayError, RelayResult};
use tokio::time::timeout;
use tracing::error;

/// Runs `operation`, turning an elapsed deadline into [`RelayError::Timeout`].
pub async fn with_timeout<F, T>(
    operation: F,
    timeout_duration: Duration,
    operation_name: &str,
) -> RelayResult<T>
where
    F: Future<Output = RelayResult<T>>,
{
    match timeout(timeout_duration, operation).await {
        Ok(result) => result,
        Err(_) => {
            let error_msg =
                format!("操作 '{operation_name}' 超时 (超时时间: {timeout_duration:?})");
            error!("{}", error_msg);
            Err(RelayError::timeout_error(error_msg))
        }
    }
}
