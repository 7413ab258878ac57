//! Stop signal shared by `main`, the controller and the informers it starts.

use tokio::sync::watch;

/// Creates a connected stop handle and signal.
pub fn stop_channel() -> (StopHandle, StopSignal) {
    let (tx, rx) = watch::channel(false);
    (StopHandle { tx }, StopSignal { rx })
}

/// Owner side of the stop signal.
///
/// Dropping the handle counts as stopping, the same as calling [`StopHandle::stop`].
#[derive(Debug)]
pub struct StopHandle {
    tx: watch::Sender<bool>,
}

impl StopHandle {
    /// Raises the stop signal for every [`StopSignal`] clone.
    pub fn stop(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiver side of the stop signal.
#[derive(Debug, Clone)]
pub struct StopSignal {
    rx: watch::Receiver<bool>,
}

impl StopSignal {
    /// Returns true once the signal was raised or its handle dropped.
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolves once the signal is raised or its handle dropped.
    pub async fn stopped(&self) {
        let mut rx = self.rx.clone();
        // Err means the handle was dropped
        let _ = rx.wait_for(|stopped| *stopped).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stop_raises_signal() {
        let (handle, signal) = stop_channel();
        assert!(!signal.is_stopped());

        handle.stop();

        assert!(signal.is_stopped());
        tokio::time::timeout(Duration::from_secs(1), signal.stopped())
            .await
            .expect("stopped() should resolve after stop()");
    }

    #[tokio::test]
    async fn test_dropping_handle_counts_as_stop() {
        let (handle, signal) = stop_channel();
        let clone = signal.clone();
        drop(handle);

        assert!(signal.is_stopped());
        tokio::time::timeout(Duration::from_secs(1), clone.stopped())
            .await
            .expect("stopped() should resolve after the handle is dropped");
    }

    #[tokio::test]
    async fn test_stopped_pends_while_running() {
        let (_handle, signal) = stop_channel();
        let result = tokio::time::timeout(Duration::from_millis(20), signal.stopped()).await;
        assert!(result.is_err(), "stopped() should not resolve without a stop");
    }
}
