//! Cooperative shutdown.
//!
//! The signal listener's only job is to fire the shutdown token; everything
//! holding a broker connection observes the token and drives its own orderly
//! close. Cancellation is cooperative, checked between deliveries, never
//! preemptive.

use tokio::sync::broadcast;
use tracing::{error, info};

/// Broadcast shutdown token.
///
/// Hand out receivers with [`Shutdown::subscribe`] and keep at least one
/// clone alive for the process lifetime (a fully dropped token reads as an
/// immediate shutdown to every receiver).
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

impl Shutdown {
    /// New, untriggered token.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// A receiver that resolves once shutdown is triggered.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger shutdown. Safe to call with no live receivers.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }
}

/// Wait for SIGINT or SIGTERM, then trigger the token.
///
/// Spawned once at process start next to the consume loop.
pub async fn listen_for_signals(shutdown: Shutdown) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Unable to listen for interrupt signal");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Unable to listen for terminate signal");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received interrupt signal"),
        () = terminate => info!("Received terminate signal"),
    }

    shutdown.trigger();
}
