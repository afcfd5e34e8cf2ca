use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;

/// 完成计数门
///
/// Counts outstanding parallel dispatches. Each submission takes a
/// [`GateGuard`]; dropping it marks the dispatch complete.
#[derive(Debug, Default)]
pub struct CompletionGate {
    outstanding: AtomicUsize,
    notify: Notify,
}

impl CompletionGate {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn enter(self: &Arc<Self>) -> GateGuard {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        GateGuard {
            gate: Arc::clone(self),
        }
    }

    pub fn outstanding(&self) -> usize {
        self.outstanding.load(Ordering::SeqCst)
    }

    /// Resolves once no dispatch is outstanding.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.outstanding() == 0 {
                return;
            }
            notified.await;
        }
    }
}

/// Held by one outstanding dispatch.
#[derive(Debug)]
pub struct GateGuard {
    gate: Arc<CompletionGate>,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        if self.gate.outstanding.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.gate.notify.notify_waiters();
        }
    }
}
