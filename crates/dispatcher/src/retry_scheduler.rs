use std::future::Future;

use relay_core::{DispatchOutcome, InterruptToken, RelayError, ResultPredicate, RetryPolicy};
use tracing::{debug, info, warn};

/// Reason carried by the outcome when the retry predicate still rejects the last reply.
pub const INVALID_REPLY_REASON: &str = "invalid reply message is received";

/// 重试调度器
///
/// Wraps one logical dispatch in bounded exponential backoff. Waits happen
/// inside the calling task and are cut short by the interrupt token.
#[derive(Debug, Clone)]
pub struct RetryScheduler {
    name: String,
    interrupt: InterruptToken,
}

impl RetryScheduler {
    pub fn new(name: impl Into<String>, interrupt: InterruptToken) -> Self {
        Self {
            name: name.into(),
            interrupt,
        }
    }

    /// Runs `attempt` up to `policy.max_attempts()` times.
    ///
    /// `attempt` receives the 1-based attempt number. Timeouts, transport
    /// failures and rejected content are retried; every other outcome is
    /// returned as is. After exhaustion the last outcome is returned verbatim.
    pub async fn execute<F, Fut>(
        &self,
        policy: &RetryPolicy,
        retry_predicate: Option<&dyn ResultPredicate>,
        mut attempt: F,
    ) -> DispatchOutcome
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = DispatchOutcome>,
    {
        let mut state = policy.start();
        let mut attempt_no = 0u32;

        loop {
            if self.interrupt.is_interrupted() {
                info!("分发器 [{}] 在第 {} 次尝试前被中断", self.name, attempt_no + 1);
                return DispatchOutcome::Interrupted;
            }
            attempt_no += 1;

            let outcome = match attempt(attempt_no).await {
                DispatchOutcome::Success(reply) => match retry_predicate {
                    None => return DispatchOutcome::Success(reply),
                    Some(predicate) => match predicate.evaluate(&reply).await {
                        Ok(false) => return DispatchOutcome::Success(reply),
                        Ok(true) => {
                            debug!(
                                "分发器 [{}] 第 {} 次尝试的应答满足重试条件",
                                self.name, attempt_no
                            );
                            DispatchOutcome::Failed(RelayError::ContentRejected(
                                INVALID_REPLY_REASON.to_string(),
                            ))
                        }
                        Err(e) => return DispatchOutcome::Failed(e),
                    },
                },
                DispatchOutcome::Interrupted => return DispatchOutcome::Interrupted,
                other if !other.is_retryable() => return other,
                other => other,
            };

            let Some(wait) = state.next_wait() else {
                if policy.max_retries > 0 {
                    warn!(
                        "分发器 [{}] 重试 {} 次后仍然失败: {}",
                        self.name,
                        policy.max_retries,
                        describe(&outcome)
                    );
                }
                return outcome;
            };

            warn!(
                "分发器 [{}] 第 {} 次尝试失败 ({}), {} 秒后重试, 剩余重试次数 {}",
                self.name,
                attempt_no,
                describe(&outcome),
                wait.as_secs(),
                state.attempts_left()
            );

            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = self.interrupt.interrupted() => {
                    info!("分发器 [{}] 在重试等待期间被中断", self.name);
                    return DispatchOutcome::Interrupted;
                }
            }
        }
    }
}

fn describe(outcome: &DispatchOutcome) -> String {
    match outcome {
        DispatchOutcome::Success(_) => "success".to_string(),
        DispatchOutcome::TimedOut(reason) => format!("timeout: {reason}"),
        DispatchOutcome::Failed(e) => e.to_string(),
        DispatchOutcome::Interrupted => "interrupted".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::ShutdownSignal;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::Instant;

    fn scheduler() -> RetryScheduler {
        RetryScheduler::new("test", InterruptToken::never())
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_retries_single_attempt() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        let outcome = scheduler()
            .execute(&RetryPolicy::no_retry(), None, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { DispatchOutcome::TimedOut("first".into()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(outcome, DispatchOutcome::TimedOut(ref r) if r == "first"));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_waits_double() {
        let times = std::sync::Mutex::new(Vec::new());
        let start = Instant::now();
        let outcome = scheduler()
            .execute(&RetryPolicy::new(3, 1, 3), None, |_| {
                times.lock().unwrap().push(start.elapsed().as_secs());
                async { DispatchOutcome::Failed(RelayError::transport_error("down")) }
            })
            .await;

        // waits of 1, 2 and 3 (clamped) seconds
        assert_eq!(*times.lock().unwrap(), vec![0, 1, 3, 6]);
        assert!(matches!(outcome, DispatchOutcome::Failed(RelayError::TransportFailure(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_retry() {
        let outcome = scheduler()
            .execute(&RetryPolicy::new(2, 1, 1), None, |n| async move {
                if n < 2 {
                    DispatchOutcome::TimedOut("slow".into())
                } else {
                    DispatchOutcome::Success(format!("reply-{n}"))
                }
            })
            .await;
        assert!(matches!(outcome, DispatchOutcome::Success(ref r) if r == "reply-2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_returns_immediately() {
        let calls = AtomicU32::new(0);
        let outcome = scheduler()
            .execute(&RetryPolicy::new(5, 1, 1), None, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { DispatchOutcome::Failed(RelayError::Configuration("bad".into())) }
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(matches!(outcome, DispatchOutcome::Failed(RelayError::Configuration(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_predicate_forces_retry() {
        let predicate = |reply: &str| reply.contains("busy");
        let outcome = scheduler()
            .execute(&RetryPolicy::new(2, 1, 1), Some(&predicate), |n| async move {
                if n == 1 {
                    DispatchOutcome::Success("<busy/>".into())
                } else {
                    DispatchOutcome::Success("<done/>".into())
                }
            })
            .await;
        assert!(matches!(outcome, DispatchOutcome::Success(ref r) if r == "<done/>"));

        let exhausted = scheduler()
            .execute(&RetryPolicy::new(1, 1, 1), Some(&predicate), |_| async {
                DispatchOutcome::Success("<busy/>".into())
            })
            .await;
        match exhausted {
            DispatchOutcome::Failed(RelayError::ContentRejected(reason)) => {
                assert_eq!(reason, INVALID_REPLY_REASON)
            }
            other => panic!("unexpected outcome {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_interrupt_during_wait() {
        let signal = ShutdownSignal::new();
        let scheduler = RetryScheduler::new("test", signal.token());
        let calls = Arc::new(AtomicU32::new(0));

        let task = tokio::spawn({
            let calls = Arc::clone(&calls);
            async move {
                scheduler
                    .execute(&RetryPolicy::new(3, 60, 60), None, |_| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        async { DispatchOutcome::TimedOut("slow".into()) }
                    })
                    .await
            }
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        signal.trigger();

        let outcome = task.await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Interrupted));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
