//! Poll loop
//!
//! The coordinator only refreshes when asked; this task asks every
//! `update_interval` until cancelled.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::coordinator::Coordinator;

/// Spawn the periodic refresh task
///
/// The first refresh (and with it discovery) runs immediately. Cancel the
/// returned token to stop the loop; an in-flight refresh is dropped.
pub fn start_poll_loop(
    coordinator: Arc<Coordinator>,
    interval: Duration,
) -> (tokio::task::JoinHandle<()>, CancellationToken) {
    let token = CancellationToken::new();
    let task_token = token.clone();

    let handle = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut was_ok = true;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let refresh = coordinator.refresh();
                    let snapshot = tokio::select! {
                        snapshot = refresh => snapshot,
                        () = task_token.cancelled() => break,
                    };

                    let ok = coordinator.last_refresh_succeeded();
                    if ok != was_ok {
                        if ok {
                            info!("Boiler reachable again");
                        } else {
                            warn!("Boiler not answering, serving cached values");
                        }
                        was_ok = ok;
                    }
                    debug!("Poll: {} values", snapshot.len());
                }
                () = task_token.cancelled() => {
                    info!("Poll loop received cancellation signal, shutting down");
                    break;
                }
            }
        }

        info!("Poll loop terminated");
    });

    (handle, token)
}
