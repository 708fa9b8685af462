//! Stop signal for a running validator.
//!
//! A node stops in a fixed order: the HTTP API stops accepting requests and
//! drains, then the driver loop finishes the tick it is in, and only then is
//! the record store released. This module only carries the "stop now" flag;
//! [`ValidatorNode::stop`](crate::ValidatorNode::stop) walks the order.

use std::future::Future;

use tokio::signal;
use tokio::sync::watch;

/// A latched stop flag shared by the API server and the node.
///
/// Once [`shutdown`](Self::shutdown) has been called the flag stays set, so
/// a waiter created afterwards resolves immediately.
pub struct ShutdownController {
    stopped: watch::Sender<bool>,
}

impl ShutdownController {
    pub fn new() -> Self {
        let (stopped, _) = watch::channel(false);
        Self { stopped }
    }

    pub fn is_shutdown(&self) -> bool {
        *self.stopped.borrow()
    }

    /// Resolves once the node has been told to stop.
    pub fn signalled(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.stopped.subscribe();
        async move {
            // A dropped controller also means stop.
            let _ = rx.wait_for(|stopped| *stopped).await;
        }
    }

    pub fn shutdown(&self) {
        self.stopped.send_replace(true);
    }

    /// Block until SIGINT or SIGTERM arrives, then raise the flag.
    pub async fn wait_for_signal(&self) {
        #[cfg(unix)]
        let terminate = async {
            match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "no SIGTERM handler, waiting for SIGINT only");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = signal::ctrl_c() => tracing::info!(signal = "SIGINT", "stop requested"),
            _ = terminate => tracing::info!(signal = "SIGTERM", "stop requested"),
        }
        self.shutdown();
    }
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn every_waiter_sees_the_stop() {
        let controller = ShutdownController::new();
        let first = controller.signalled();
        let second = controller.signalled();
        assert!(!controller.is_shutdown());

        controller.shutdown();
        assert!(controller.is_shutdown());
        tokio::time::timeout(Duration::from_secs(1), async {
            first.await;
            second.await;
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn waiter_created_after_the_stop_resolves() {
        let controller = ShutdownController::new();
        controller.shutdown();
        tokio::time::timeout(Duration::from_secs(1), controller.signalled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn unsignalled_waiter_stays_pending() {
        let controller = ShutdownController::new();
        let waiter = controller.signalled();
        assert!(tokio::time::timeout(Duration::from_millis(50), waiter)
            .await
            .is_err());
    }
}
