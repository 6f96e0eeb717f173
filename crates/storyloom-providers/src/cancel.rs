//! Cooperative cancellation

use crate::error::ProviderError;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Externally owned cancellation signal
///
/// Clones share state; cancelling any clone cancels them all.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    inner: Arc<Inner>,
}

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once the signal has been cancelled
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Drive `future` unless the signal fires first
    ///
    /// On cancellation the future is dropped, aborting any request it owns.
    pub async fn run<F, T>(&self, future: F) -> Result<T, ProviderError>
    where
        F: Future<Output = Result<T, ProviderError>>,
    {
        if self.is_cancelled() {
            return Err(ProviderError::Cancelled);
        }

        tokio::select! {
            biased;
            _ = self.cancelled() => Err(ProviderError::Cancelled),
            result = future => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_before_run() {
        let signal = CancelSignal::new();
        signal.cancel();
        let result = signal.run(async { Ok::<_, ProviderError>(1) }).await;
        assert!(matches!(result, Err(ProviderError::Cancelled)));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_pending_future() {
        let signal = CancelSignal::new();
        let trigger = signal.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let result = signal
            .run(async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, ProviderError>(())
            })
            .await;
        assert!(result.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn test_completes_without_cancel() {
        let signal = CancelSignal::new();
        assert_eq!(signal.run(async { Ok(7) }).await.unwrap(), 7);
    }
}
