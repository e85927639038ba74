//! Signal handling for graceful shutdown
//!
//! Ctrl-C and SIGTERM are turned into a single shutdown notification so the
//! front-end can stop the queue and requeue running jobs before exiting.

use std::future;

use tokio::signal;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Resolve on the first Ctrl-C or SIGTERM
///
/// A handler that cannot be installed is logged and never fires.
pub async fn shutdown_requested() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Ctrl+C received"),
            Err(e) => {
                error!("Cannot listen for Ctrl+C: {}", e);
                future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("SIGTERM received");
            }
            Err(e) => {
                error!("Cannot listen for SIGTERM: {}", e);
                future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Broadcast a shutdown notification when a signal arrives
pub fn spawn_signal_listener(shutdown_tx: broadcast::Sender<()>) -> JoinHandle<()> {
    tokio::spawn(async move {
        shutdown_requested().await;
        info!("Initiating graceful shutdown");
        let _ = shutdown_tx.send(());
    })
}

/// Create a shutdown broadcaster
pub fn create_shutdown_channel() -> (broadcast::Sender<()>, broadcast::Receiver<()>) {
    broadcast::channel(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[tokio::test]
    async fn test_shutdown_channel_reaches_all_receivers() {
        let (tx, _) = create_shutdown_channel();
        let mut rx1 = tx.subscribe();
        let mut rx2 = tx.subscribe();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let _ = tx.send(());
        });

        assert!(timeout(Duration::from_millis(200), rx1.recv()).await.is_ok());
        assert!(timeout(Duration::from_millis(200), rx2.recv()).await.is_ok());
    }

    #[tokio::test]
    async fn test_listener_stays_quiet_without_signal() {
        let (tx, mut rx) = create_shutdown_channel();
        let handle = spawn_signal_listener(tx);

        let waited = timeout(Duration::from_millis(50), rx.recv()).await;
        assert!(waited.is_err());
        handle.abort();
    }
}
