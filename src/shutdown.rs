//! Cooperative shutdown.
//!
//! The capture loop polls a [`ShutdownSignal`] between events and also waits on it alongside
//! the event source, so a request made while the loop is blocked ends the wait.

use tokio::sync::watch;

/// Create a connected handle/signal pair.
pub fn channel() -> (ShutdownHandle, ShutdownSignal) {
    let (tx, rx) = watch::channel(false);

    (ShutdownHandle { tx }, ShutdownSignal { rx })
}

/// Requests a shutdown.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

impl ShutdownHandle {
    pub fn request(&self) {
        self.tx.send_replace(true);
    }
}

/// Observes shutdown requests.
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    rx: watch::Receiver<bool>,
}

impl ShutdownSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_, signal) = channel();
        signal
    }

    pub fn is_requested(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once a shutdown has been requested.
    ///
    /// If the handle is dropped without requesting a shutdown, this never resolves.
    pub async fn requested(&mut self) {
        if self.rx.wait_for(|stop| *stop).await.is_err() {
            futures::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn request_wakes_waiter() {
        let (handle, mut signal) = channel();
        assert!(!signal.is_requested());

        let waiter = tokio::spawn(async move {
            signal.requested().await;
            signal.is_requested()
        });

        handle.request();
        assert!(waiter.await.unwrap());
    }

    #[tokio::test]
    async fn request_before_wait_is_kept() {
        let (handle, mut signal) = channel();
        handle.request();

        tokio::time::timeout(Duration::from_secs(1), signal.requested())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn dropped_handle_never_fires() {
        let mut signal = ShutdownSignal::never();

        assert!(
            tokio::time::timeout(Duration::from_millis(10), signal.requested())
                .await
                .is_err()
        );
    }
}
