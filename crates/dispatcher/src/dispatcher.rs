use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use relay_core::{
    utils::skip_xml_declaration, AuditLog, AuditRecord, ConfigValidator, DispatchConfig,
    DispatchOutcome, DispatchRequest, ExitState, Forward, InterruptToken, ItemDispatch, Listener,
    MonitoringEvent, MonitoringSink, NoopMonitoringSink, RelayError, RelayResult,
    ResultPredicate, Sender, Transformer,
};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::correlator::Correlator;
use crate::presumed_timeout::PresumedTimeoutRegistry;
use crate::retry_scheduler::RetryScheduler;

/// Reason carried by a short-circuited dispatch.
pub const PRESUMED_TIMEOUT_REASON: &str = "presumedTimeout";

const NO_AUDIT_TRAIL: &str = "no audit trail";

/// 可靠分发器
///
/// Composes the presumed-timeout guard, the retry scheduler and the
/// correlator into "dispatch one item, classify one outcome".
pub struct Dispatcher {
    config: DispatchConfig,
    sender: Arc<dyn Sender>,
    sender_name: String,
    listener: Option<Arc<dyn Listener>>,
    listener_name: String,
    correlator: Correlator,
    retry_predicate: Option<Arc<dyn ResultPredicate>>,
    registry: Arc<PresumedTimeoutRegistry>,
    monitoring: Arc<dyn MonitoringSink>,
    audit_log: Option<Arc<dyn AuditLog>>,
    audit_trail: Option<Arc<dyn Transformer>>,
    label: Option<Arc<dyn Transformer>>,
    scheduler: RetryScheduler,
    interrupt: InterruptToken,
}

impl Dispatcher {
    pub fn builder(config: DispatchConfig, sender: Arc<dyn Sender>) -> DispatcherBuilder {
        DispatcherBuilder::new(config, sender)
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn sender_name(&self) -> &str {
        &self.sender_name
    }

    pub fn listener_name(&self) -> Option<&str> {
        self.listener.as_ref().map(|_| self.listener_name.as_str())
    }

    /// Runs one logical dispatch and classifies its outcome.
    #[instrument(skip_all, fields(dispatcher = %self.config.name))]
    pub async fn dispatch(&self, request: DispatchRequest) -> DispatchOutcome {
        if self.config.presumed_timeout_enabled() {
            let interval = Duration::from_secs(self.config.presumed_timeout_interval as u64);
            if self.registry.is_presumed_timeout(&self.config.name, interval) {
                warn!(
                    "分发器 [{}] 在 {} 秒内发生过超时，推定本次分发超时",
                    self.config.name, self.config.presumed_timeout_interval
                );
                debug!(
                    "分发器 [{}] exit state [{}]",
                    self.config.name,
                    ExitState::PresumedTimeout
                );
                self.report_timeout();
                return DispatchOutcome::TimedOut(PRESUMED_TIMEOUT_REASON.to_string());
            }
        }

        let policy = self.config.retry_policy();
        let outcome = self
            .scheduler
            .execute(&policy, self.retry_predicate.as_deref(), |attempt| {
                self.attempt(&request, attempt)
            })
            .await;

        let outcome = match outcome {
            DispatchOutcome::Success(reply) => match self.audit(&request).await {
                Ok(()) => DispatchOutcome::Success(reply),
                Err(e) => {
                    error!("分发器 [{}] 写入审计日志失败: {}", self.config.name, e);
                    DispatchOutcome::Failed(e)
                }
            },
            other => other,
        };

        match &outcome {
            DispatchOutcome::Success(_) => {
                if self.registry.clear_timeout_pending(&self.config.name) {
                    self.monitoring
                        .event(&self.config.name, MonitoringEvent::TimeoutCleared);
                }
                info!("分发器 [{}] 分发成功", self.config.name);
            }
            DispatchOutcome::TimedOut(reason) => {
                warn!("分发器 [{}] 分发超时: {}", self.config.name, reason);
                self.report_timeout();
            }
            DispatchOutcome::Failed(e) => {
                warn!("分发器 [{}] 分发失败: {}", self.config.name, e);
                self.monitoring
                    .event(&self.config.name, MonitoringEvent::ExceptionCaught);
            }
            DispatchOutcome::Interrupted => {
                info!("分发器 [{}] 分发被中断", self.config.name);
            }
        }

        outcome
    }

    /// Dispatches and maps the outcome to the forward a pipeline continues with.
    pub async fn dispatch_or_forward(&self, request: DispatchRequest) -> Forward {
        match self.dispatch(request).await {
            DispatchOutcome::Success(reply) => match &self.config.check_root_tag {
                Some(tag) if !has_root_tag(&reply, tag) => {
                    warn!(
                        "分发器 [{}] 应答的根元素不是 [{}]",
                        self.config.name, tag
                    );
                    Forward::IllegalResult(reply)
                }
                _ => Forward::Success(reply),
            },
            DispatchOutcome::TimedOut(reason) => match &self.config.result_on_time_out {
                Some(result) => Forward::Success(result.clone()),
                None if reason == PRESUMED_TIMEOUT_REASON => Forward::PresumedTimeout(reason),
                None => Forward::Timeout(reason),
            },
            DispatchOutcome::Failed(e) => Forward::Exception(e.to_string()),
            DispatchOutcome::Interrupted => Forward::Interrupt,
        }
    }

    async fn attempt(&self, request: &DispatchRequest, attempt: u32) -> DispatchOutcome {
        let started = Instant::now();

        let outcome = tokio::select! {
            result = self.send_and_receive(request) => {
                DispatchOutcome::from(self.apply_test_hooks(result))
            }
            _ = self.interrupt.interrupted() => DispatchOutcome::Interrupted,
        };

        let exit_state = outcome.exit_state();
        if self.config.presumed_timeout_enabled() {
            self.registry.record_exit(&self.config.name, exit_state);
        }
        debug!(
            "分发器 [{}] 第 {} 次尝试耗时 {}ms, exit state [{}]",
            self.config.name,
            attempt,
            started.elapsed().as_millis(),
            exit_state
        );
        outcome
    }

    async fn send_and_receive(&self, request: &DispatchRequest) -> RelayResult<String> {
        debug!(
            "分发器 [{}] 通过 [{}] 发送消息 [{}]",
            self.config.name,
            self.sender_name,
            request.message_id().unwrap_or("-")
        );
        let reply = self.sender.send(request.payload(), request.context()).await?;
        if self.sender.is_synchronous() {
            return Ok(reply);
        }

        match &self.listener {
            Some(listener) => {
                debug!(
                    "分发器 [{}] 在 [{}] 上等待令牌 [{}] 的应答",
                    self.config.name, self.listener_name, reply
                );
                self.correlator
                    .await_reply(listener.as_ref(), &reply, request, listener.timeout())
                    .await
            }
            None => Ok(reply),
        }
    }

    fn apply_test_hooks(&self, result: RelayResult<String>) -> RelayResult<String> {
        let reply = result?;
        if let Some(literal) = self
            .config
            .time_out_on_result
            .as_deref()
            .filter(|l| !l.is_empty())
        {
            if reply == literal {
                return Err(RelayError::Timeout(format!("timeOutOnResult [{literal}]")));
            }
        }
        if let Some(literal) = self
            .config
            .exception_on_result
            .as_deref()
            .filter(|l| !l.is_empty())
        {
            if reply == literal {
                return Err(RelayError::ContentRejected(format!(
                    "exceptionOnResult [{literal}]"
                )));
            }
        }
        Ok(reply)
    }

    fn report_timeout(&self) {
        self.registry.mark_timeout_pending(&self.config.name);
        self.monitoring
            .event(&self.config.name, MonitoringEvent::TimeoutOccurred);
    }

    async fn audit(&self, request: &DispatchRequest) -> RelayResult<()> {
        let Some(audit_log) = &self.audit_log else {
            return Ok(());
        };

        let params: HashMap<String, String> = request.context().values().clone();
        let trail = match &self.audit_trail {
            Some(transformer) => transformer.transform(request.payload(), &params).await?,
            None => NO_AUDIT_TRAIL.to_string(),
        };
        let label = match &self.label {
            Some(transformer) => Some(transformer.transform(request.payload(), &params).await?),
            None => None,
        };

        audit_log
            .store(AuditRecord {
                message_id: request.message_id().unwrap_or("-").to_string(),
                correlation_id: request.correlation_id().unwrap_or("-").to_string(),
                timestamp: Utc::now(),
                trail,
                label,
                payload: request.payload().to_string(),
            })
            .await
    }
}

#[async_trait]
impl ItemDispatch for Dispatcher {
    fn name(&self) -> &str {
        &self.config.name
    }

    async fn dispatch(&self, request: DispatchRequest) -> DispatchOutcome {
        Dispatcher::dispatch(self, request).await
    }
}

fn has_root_tag(reply: &str, tag: &str) -> bool {
    let body = skip_xml_declaration(reply).trim_start();
    match body.strip_prefix('<').and_then(|rest| rest.strip_prefix(tag)) {
        Some(rest) => rest
            .chars()
            .next()
            .map_or(false, |c| c == '>' || c == '/' || c.is_whitespace()),
        None => false,
    }
}

/// Builder for [`Dispatcher`].
pub struct DispatcherBuilder {
    config: DispatchConfig,
    sender: Arc<dyn Sender>,
    listener: Option<Arc<dyn Listener>>,
    retry_predicate: Option<Arc<dyn ResultPredicate>>,
    registry: Option<Arc<PresumedTimeoutRegistry>>,
    monitoring: Option<Arc<dyn MonitoringSink>>,
    audit_log: Option<Arc<dyn AuditLog>>,
    audit_trail: Option<Arc<dyn Transformer>>,
    label: Option<Arc<dyn Transformer>>,
    interrupt: InterruptToken,
}

impl DispatcherBuilder {
    pub fn new(config: DispatchConfig, sender: Arc<dyn Sender>) -> Self {
        Self {
            config,
            sender,
            listener: None,
            retry_predicate: None,
            registry: None,
            monitoring: None,
            audit_log: None,
            audit_trail: None,
            label: None,
            interrupt: InterruptToken::never(),
        }
    }

    pub fn with_listener(mut self, listener: Arc<dyn Listener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn with_retry_predicate(mut self, predicate: Arc<dyn ResultPredicate>) -> Self {
        self.retry_predicate = Some(predicate);
        self
    }

    /// Shares the presumed-timeout registry with other dispatchers.
    pub fn with_registry(mut self, registry: Arc<PresumedTimeoutRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_monitoring(mut self, monitoring: Arc<dyn MonitoringSink>) -> Self {
        self.monitoring = Some(monitoring);
        self
    }

    pub fn with_audit_log(mut self, audit_log: Arc<dyn AuditLog>) -> Self {
        self.audit_log = Some(audit_log);
        self
    }

    pub fn with_audit_trail(mut self, transformer: Arc<dyn Transformer>) -> Self {
        self.audit_trail = Some(transformer);
        self
    }

    pub fn with_label(mut self, transformer: Arc<dyn Transformer>) -> Self {
        self.label = Some(transformer);
        self
    }

    pub fn with_interrupt(mut self, interrupt: InterruptToken) -> Self {
        self.interrupt = interrupt;
        self
    }

    pub fn build(self) -> RelayResult<Dispatcher> {
        self.config.validate()?;
        let config = self.config.normalized();

        if self.listener.is_some() && self.sender.is_synchronous() {
            return Err(RelayError::Configuration(format!(
                "dispatcher [{}] cannot have a listener with a synchronous sender",
                config.name
            )));
        }

        let sender_name = match self.sender.name() {
            "" => format!("{}-sender", config.name),
            name => name.to_string(),
        };
        let listener_name = match self.listener.as_ref().map(|l| l.name()) {
            Some(name) if !name.is_empty() => name.to_string(),
            _ => format!("{}-replylistener", config.name),
        };

        info!(
            "创建分发器 [{}], sender [{}], linkMethod [{}], maxRetries [{}]",
            config.name, sender_name, config.link_method, config.max_retries
        );

        Ok(Dispatcher {
            correlator: Correlator::new(config.link_method),
            scheduler: RetryScheduler::new(config.name.clone(), self.interrupt.clone()),
            config,
            sender: self.sender,
            sender_name,
            listener: self.listener,
            listener_name,
            retry_predicate: self.retry_predicate,
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(PresumedTimeoutRegistry::new())),
            monitoring: self
                .monitoring
                .unwrap_or_else(|| Arc::new(NoopMonitoringSink)),
            audit_log: self.audit_log,
            audit_trail: self.audit_trail,
            label: self.label,
            interrupt: self.interrupt,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_tag_check() {
        assert!(has_root_tag("<reply>ok</reply>", "reply"));
        assert!(has_root_tag("<?xml version=\"1.0\"?>\n<reply a=\"1\"/>", "reply"));
        assert!(has_root_tag("  <reply/>", "reply"));
        assert!(!has_root_tag("<replyX/>", "reply"));
        assert!(!has_root_tag("reply", "reply"));
        assert!(!has_root_tag("<other/>", "reply"));
    }
}
