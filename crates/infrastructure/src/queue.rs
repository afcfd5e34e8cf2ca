use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use relay_core::{DispatchContext, LinkMethod, Listener, RelayError, RelayResult, Sender};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 队列中的请求消息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    pub correlation_id: Option<String>,
    /// Key the reply has to be tagged with to reach the waiting listener.
    pub reply_key: String,
    pub payload: String,
}

/// 内存请求/应答队列
///
/// Requests travel over an unbounded channel to whoever took the receiving
/// end. Replies are parked by key until a [`QueueListener`] collects them.
#[derive(Debug)]
pub struct InMemoryQueue {
    requests: mpsc::UnboundedSender<QueueMessage>,
    receiver: Mutex<Option<mpsc::UnboundedReceiver<QueueMessage>>>,
    replies: Mutex<HashMap<String, String>>,
    arrived: Notify,
}

impl InMemoryQueue {
    pub fn new() -> Arc<Self> {
        let (requests, receiver) = mpsc::unbounded_channel();
        Arc::new(Self {
            requests,
            receiver: Mutex::new(Some(receiver)),
            replies: Mutex::new(HashMap::new()),
            arrived: Notify::new(),
        })
    }

    /// Sender publishing to this queue. `link_method` decides which id the
    /// reply must carry.
    pub fn sender(self: &Arc<Self>, name: impl Into<String>, link_method: LinkMethod) -> QueueSender {
        QueueSender {
            name: name.into(),
            link_method,
            queue: Arc::clone(self),
        }
    }

    pub fn listener(self: &Arc<Self>, name: impl Into<String>, timeout: Duration) -> QueueListener {
        QueueListener {
            name: name.into(),
            timeout,
            queue: Arc::clone(self),
        }
    }

    /// The consuming end of the request channel. Available once.
    pub fn take_requests(&self) -> Option<mpsc::UnboundedReceiver<QueueMessage>> {
        self.receiver
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    /// Parks a reply and wakes waiting listeners.
    pub fn reply(&self, key: impl Into<String>, payload: impl Into<String>) {
        let key = key.into();
        debug!("收到应答消息, key [{}]", key);
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key, payload.into());
        self.arrived.notify_waiters();
    }

    /// Number of replies nobody has collected yet.
    pub fn pending_replies(&self) -> usize {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Consumes requests on a background task, answering each with `handler`.
    pub fn spawn_responder<F>(self: &Arc<Self>, handler: F) -> RelayResult<JoinHandle<()>>
    where
        F: Fn(&QueueMessage) -> String + Send + 'static,
    {
        let mut requests = self.take_requests().ok_or_else(|| {
            RelayError::Configuration("queue already has a consumer".to_string())
        })?;
        let queue = Arc::clone(self);
        info!("启动内存队列应答任务");
        Ok(tokio::spawn(async move {
            while let Some(message) = requests.recv().await {
                let reply = handler(&message);
                queue.reply(message.reply_key, reply);
            }
            debug!("内存队列应答任务结束");
        }))
    }

    fn take_reply(&self, key: &str) -> Option<String> {
        self.replies
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key)
    }

    async fn wait_reply(&self, key: &str) -> String {
        loop {
            let notified = self.arrived.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if let Some(reply) = self.take_reply(key) {
                return reply;
            }
            notified.await;
        }
    }
}

/// 内存队列发送器（异步）
///
/// Returns the message id as the correlation token.
#[derive(Debug, Clone)]
pub struct QueueSender {
    name: String,
    link_method: LinkMethod,
    queue: Arc<InMemoryQueue>,
}

#[async_trait]
impl Sender for QueueSender {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_synchronous(&self) -> bool {
        false
    }

    async fn send(&self, payload: &str, context: &DispatchContext) -> RelayResult<String> {
        let message_id = context
            .message_id()
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        let correlation_id = context.correlation_id().map(str::to_string);
        let reply_key = match self.link_method {
            LinkMethod::MessageId => message_id.clone(),
            LinkMethod::CorrelationId => correlation_id.clone().ok_or_else(|| {
                RelayError::Configuration(format!(
                    "sender [{}] links on correlation id but the message has none",
                    self.name
                ))
            })?,
        };

        self.queue
            .requests
            .send(QueueMessage {
                message_id: message_id.clone(),
                correlation_id,
                reply_key,
                payload: payload.to_string(),
            })
            .map_err(|_| RelayError::transport_error("queue has no consumer"))?;
        debug!("sender [{}] published message [{}]", self.name, message_id);
        Ok(message_id)
    }
}

/// 内存队列应答监听器
#[derive(Debug, Clone)]
pub struct QueueListener {
    name: String,
    timeout: Duration,
    queue: Arc<InMemoryQueue>,
}

#[async_trait]
impl Listener for QueueListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn receive(
        &self,
        correlation_key: &str,
        _context: &DispatchContext,
        timeout: Duration,
    ) -> RelayResult<String> {
        match tokio::time::timeout(timeout, self.queue.wait_reply(correlation_key)).await {
            Ok(reply) => Ok(reply),
            Err(_) => {
                warn!(
                    "listener [{}] received no reply for [{}] within {:?}",
                    self.name, correlation_key, timeout
                );
                Err(RelayError::timeout_error(format!(
                    "no reply for [{correlation_key}] within {timeout:?}"
                )))
            }
        }
    }
}
