use tokio::sync::watch;
use tracing::{debug, info};

/// 中断信号管理器
///
/// Owns the sending side of the interrupt channel. Every dispatcher and
/// iteration engine holds an [`InterruptToken`] subscribed to it.
#[derive(Debug)]
pub struct ShutdownSignal {
    tx: watch::Sender<bool>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx }
    }

    /// 订阅中断信号
    pub fn token(&self) -> InterruptToken {
        InterruptToken {
            rx: self.tx.subscribe(),
        }
    }

    /// 触发中断
    pub fn trigger(&self) {
        if *self.tx.borrow() {
            debug!("中断信号已经触发过");
            return;
        }
        info!(
            "触发中断，通知 {} 个订阅者",
            self.tx.receiver_count()
        );
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving side of a [`ShutdownSignal`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct InterruptToken {
    rx: watch::Receiver<bool>,
}

impl InterruptToken {
    /// A token that is never triggered.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_interrupted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal has been triggered; pending forever otherwise.
    pub async fn interrupted(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // sender dropped without triggering
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for InterruptToken {
    fn default() -> Self {
        Self::never()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_subscribers() {
        let signal = ShutdownSignal::new();
        let token = signal.token();
        assert!(!token.is_interrupted());

        let waiter = tokio::spawn({
            let token = token.clone();
            async move { token.interrupted().await }
        });

        signal.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert!(token.is_interrupted());
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn test_late_subscriber_sees_trigger() {
        let signal = ShutdownSignal::new();
        signal.trigger();

        let token = signal.token();
        assert!(token.is_interrupted());
        tokio::time::timeout(Duration::from_millis(100), token.interrupted())
            .await
            .expect("already triggered");
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_token_stays_pending() {
        let token = InterruptToken::never();
        let result = tokio::time::timeout(Duration::from_secs(5), token.interrupted()).await;
        assert!(result.is_err());
    }
}
