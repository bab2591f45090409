use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

/// Cooperative cancellation shared by every wait in the monitoring loop.
#[derive(Clone, Default)]
pub struct Shutdown {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    flag: AtomicBool,
    triggers: AtomicUsize,
    notify: Notify,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        self.inner.triggers.fetch_add(1, Ordering::SeqCst);
        self.inner.flag.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_triggered(&self) -> bool {
        self.inner.flag.load(Ordering::SeqCst)
    }

    /// How many times `trigger` has been called.
    pub fn trigger_count(&self) -> usize {
        self.inner.triggers.load(Ordering::SeqCst)
    }

    /// Resolves once shutdown has been triggered.
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register before checking the flag so a concurrent trigger is not missed.
            notified.as_mut().enable();
            if self.is_triggered() {
                return;
            }
            notified.await;
        }
    }

    /// Sleeps for `duration`; returns `false` if shutdown interrupted the wait.
    pub async fn sleep(&self, duration: Duration) -> bool {
        if self.is_triggered() {
            return false;
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => false,
            _ = tokio::time::sleep(duration) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn sleep_completes_without_trigger() {
        let shutdown = Shutdown::new();
        assert!(shutdown.sleep(Duration::from_secs(5)).await);
        assert!(!shutdown.is_triggered());
    }

    #[tokio::test(start_paused = true)]
    async fn trigger_interrupts_sleep() {
        let shutdown = Shutdown::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.trigger();
        });

        let started = tokio::time::Instant::now();
        assert!(!shutdown.sleep(Duration::from_secs(3600)).await);
        assert!(started.elapsed() < Duration::from_secs(60));
        assert_eq!(shutdown.trigger_count(), 1);
    }

    #[tokio::test]
    async fn sleep_after_trigger_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        assert!(!shutdown.sleep(Duration::from_secs(3600)).await);
        shutdown.cancelled().await;
    }
}
