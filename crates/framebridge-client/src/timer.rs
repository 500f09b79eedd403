//! Cancellable scheduled callbacks.

use std::time::Duration;
use tokio::task::JoinHandle;

/// A callback scheduled to run once after a delay.
///
/// Dropping a timer does not disarm it.
#[derive(Debug)]
pub struct Timer {
    handle: JoinHandle<()>,
}

impl Timer {
    /// Run `callback` after `after` unless disarmed first.
    ///
    /// Must be called from within a tokio runtime.
    pub fn arm<F>(after: Duration, callback: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            callback();
        });
        Self { handle }
    }

    /// Cancel the callback if it has not run yet.
    pub fn disarm(self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let _timer = Timer::arm(Duration::from_millis(10), move || {
            flag.store(true, Ordering::SeqCst)
        });

        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(!fired.load(Ordering::SeqCst));
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(fired.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn disarmed_never_fires() {
        let fired = Arc::new(AtomicBool::new(false));
        let flag = fired.clone();
        let timer = Timer::arm(Duration::from_millis(10), move || {
            flag.store(true, Ordering::SeqCst)
        });
        timer.disarm();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!fired.load(Ordering::SeqCst));
    }
}
