//! Graceful shutdown utilities

use tracing::warn;

/// Wait for shutdown signal (Ctrl+C or SIGTERM on Unix)
///
/// ```ignore
/// tokio::select! {
///     _ = common::shutdown::wait_for_shutdown() => {
///         info!("Shutdown signal received");
///     }
///     _ = poll_loop.run() => {}
/// }
/// ```
pub async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let term_signal = match signal(SignalKind::terminate()) {
            Ok(sig) => Some(sig),
            Err(e) => {
                warn!("SIGTERM handler unavailable: {}, Ctrl+C only", e);
                None
            },
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                match term_signal {
                    Some(mut sig) => {
                        sig.recv().await;
                    },
                    None => std::future::pending::<()>().await,
                }
            } => {},
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
