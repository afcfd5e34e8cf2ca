use std::time::Duration;

use relay_core::{DispatchRequest, LinkMethod, Listener, RelayError, RelayResult};
use tracing::debug;

/// 应答关联器
///
/// Computes the key an asynchronous reply is matched on and waits for that
/// reply on the paired listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Correlator {
    link_method: LinkMethod,
}

impl Correlator {
    pub fn new(link_method: LinkMethod) -> Self {
        Self { link_method }
    }

    /// Builds a correlator from a textual link method, e.g. from a pipeline definition.
    pub fn from_link_method(link_method: &str) -> RelayResult<Self> {
        Ok(Self::new(link_method.parse()?))
    }

    pub fn link_method(&self) -> LinkMethod {
        self.link_method
    }

    /// The reply-matching key for a message the sender answered with `token`.
    pub fn correlation_key(&self, token: &str, request: &DispatchRequest) -> RelayResult<String> {
        match self.link_method {
            LinkMethod::MessageId => Ok(token.to_string()),
            LinkMethod::CorrelationId => request
                .correlation_id()
                .map(str::to_string)
                .ok_or_else(|| {
                    RelayError::Configuration(
                        "linkMethod CORRELATIONID requires a correlation id on the request"
                            .to_string(),
                    )
                }),
        }
    }

    /// Waits on `listener` for the reply to the message identified by `token`.
    pub async fn await_reply(
        &self,
        listener: &dyn Listener,
        token: &str,
        request: &DispatchRequest,
        timeout: Duration,
    ) -> RelayResult<String> {
        let key = self.correlation_key(token, request)?;
        debug!(
            "等待应答, linkMethod [{}] correlationKey [{}] timeout [{}ms]",
            self.link_method,
            key,
            timeout.as_millis()
        );
        listener.receive(&key, request.context(), timeout).await
    }
}

impl Default for Correlator {
    fn default() -> Self {
        Self::new(LinkMethod::default())
    }
}
