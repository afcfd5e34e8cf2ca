//! Hand-written test doubles for the collaborator traits
//!
//! Every mock keeps its state behind a `Mutex` so tests can inspect what
//! the code under test did after the fact.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use relay_core::{
    AuditLog, AuditRecord, DispatchContext, Listener, MonitoringEvent, MonitoringSink,
    RelayError, RelayResult, Sender,
};
use tokio::time::Instant;

/// One scripted answer of a [`ScriptedSender`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedReply {
    Reply(String),
    Timeout(String),
    Failure(String),
}

impl ScriptedReply {
    fn into_result(self) -> RelayResult<String> {
        match self {
            ScriptedReply::Reply(reply) => Ok(reply),
            ScriptedReply::Timeout(reason) => Err(RelayError::Timeout(reason)),
            ScriptedReply::Failure(reason) => Err(RelayError::TransportFailure(reason)),
        }
    }
}

type Responder = Box<dyn Fn(&str) -> ScriptedReply + Send + Sync>;
type DelayFn = Box<dyn Fn(&str) -> Duration + Send + Sync>;

/// A sent message as seen by the mock.
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub payload: String,
    pub context: DispatchContext,
    pub at: Instant,
}

/// Mock implementation of Sender for testing
///
/// Answers from a queue of scripted replies first, then from the responder.
/// Without a responder it echoes the payload (or returns the message id
/// when asynchronous).
pub struct ScriptedSender {
    name: String,
    synchronous: bool,
    script: Mutex<VecDeque<ScriptedReply>>,
    responder: Option<Responder>,
    delay: Option<DelayFn>,
    sent: Mutex<Vec<SentMessage>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedSender {
    pub fn new() -> Self {
        Self {
            name: String::new(),
            synchronous: true,
            script: Mutex::new(VecDeque::new()),
            responder: None,
            delay: None,
            sent: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Sender that answers every payload through `responder`.
    pub fn responding<F>(responder: F) -> Self
    where
        F: Fn(&str) -> ScriptedReply + Send + Sync + 'static,
    {
        Self {
            responder: Some(Box::new(responder)),
            ..Self::new()
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn asynchronous(mut self) -> Self {
        self.synchronous = false;
        self
    }

    pub fn with_script(self, replies: Vec<ScriptedReply>) -> Self {
        self.script.lock().unwrap().extend(replies);
        self
    }

    pub fn with_delay<F>(mut self, delay: F) -> Self
    where
        F: Fn(&str) -> Duration + Send + Sync + 'static,
    {
        self.delay = Some(Box::new(delay));
        self
    }

    pub fn call_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub fn payloads(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.payload.clone())
            .collect()
    }

    /// Highest number of concurrent `send` calls observed.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn answer(&self, payload: &str, context: &DispatchContext) -> RelayResult<String> {
        if let Some(reply) = self.script.lock().unwrap().pop_front() {
            return reply.into_result();
        }
        match &self.responder {
            Some(responder) => responder(payload).into_result(),
            None if self.synchronous => Ok(payload.to_string()),
            None => Ok(context.message_id().unwrap_or_default().to_string()),
        }
    }
}

impl Default for ScriptedSender {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Sender for ScriptedSender {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_synchronous(&self) -> bool {
        self.synchronous
    }

    async fn send(&self, payload: &str, context: &DispatchContext) -> RelayResult<String> {
        self.sent.lock().unwrap().push(SentMessage {
            payload: payload.to_string(),
            context: context.clone(),
            at: Instant::now(),
        });

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(current, Ordering::SeqCst);

        if let Some(delay) = &self.delay {
            tokio::time::sleep(delay(payload)).await;
        }
        let result = self.answer(payload, context);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

/// Mock implementation of Listener for testing
///
/// Replies are registered per correlation key; waiting on an unknown key
/// sleeps for the timeout and then fails with [`RelayError::Timeout`].
pub struct ScriptedListener {
    name: String,
    timeout: Duration,
    replies: Mutex<HashMap<String, String>>,
    received_keys: Mutex<Vec<String>>,
}

impl ScriptedListener {
    pub fn new(timeout: Duration) -> Self {
        Self {
            name: String::new(),
            timeout,
            replies: Mutex::new(HashMap::new()),
            received_keys: Mutex::new(Vec::new()),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn with_reply(self, key: &str, reply: &str) -> Self {
        self.add_reply(key, reply);
        self
    }

    pub fn add_reply(&self, key: &str, reply: &str) {
        self.replies
            .lock()
            .unwrap()
            .insert(key.to_string(), reply.to_string());
    }

    pub fn received_keys(&self) -> Vec<String> {
        self.received_keys.lock().unwrap().clone()
    }
}

#[async_trait]
impl Listener for ScriptedListener {
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
        self.received_keys
            .lock()
            .unwrap()
            .push(correlation_key.to_string());

        let reply = self.replies.lock().unwrap().remove(correlation_key);
        match reply {
            Some(reply) => Ok(reply),
            None => {
                tokio::time::sleep(timeout).await;
                Err(RelayError::Timeout(format!(
                    "no reply for [{correlation_key}] within {}ms",
                    timeout.as_millis()
                )))
            }
        }
    }
}

/// Mock implementation of MonitoringSink for testing
#[derive(Debug, Clone, Default)]
pub struct RecordingMonitoringSink {
    events: Arc<Mutex<Vec<(String, MonitoringEvent)>>>,
}

impl RecordingMonitoringSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<(String, MonitoringEvent)> {
        self.events.lock().unwrap().clone()
    }

    pub fn event_names(&self) -> Vec<&'static str> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .map(|(_, event)| event.name())
            .collect()
    }

    pub fn count(&self, event: MonitoringEvent) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, e)| *e == event)
            .count()
    }
}

impl MonitoringSink for RecordingMonitoringSink {
    fn event(&self, source: &str, event: MonitoringEvent) {
        self.events
            .lock()
            .unwrap()
            .push((source.to_string(), event));
    }
}

/// Mock implementation of AuditLog for testing
#[derive(Debug, Clone, Default)]
pub struct RecordingAuditLog {
    records: Arc<Mutex<Vec<AuditRecord>>>,
    fail: bool,
}

impl RecordingAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// An audit log whose every `store` fails.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuditLog for RecordingAuditLog {
    async fn store(&self, record: AuditRecord) -> RelayResult<()> {
        if self.fail {
            return Err(RelayError::AuditLog("audit store unavailable".to_string()));
        }
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}
