use async_trait::async_trait;
use relay_core::{DispatchContext, RelayResult, Sender};
use tracing::debug;

/// 回显发送器，同步返回消息本身
#[derive(Debug, Clone)]
pub struct EchoSender {
    name: String,
}

impl EchoSender {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[async_trait]
impl Sender for EchoSender {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, payload: &str, context: &DispatchContext) -> RelayResult<String> {
        debug!(
            "sender [{}] echoing message [{}]",
            self.name,
            context.message_id().unwrap_or("-")
        );
        Ok(payload.to_string())
    }
}
