//! Polling worker for the queue board

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use refresh_api::QueueSnapshot;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::board::Cadence;
use crate::errors::MonitorError;
use crate::http::backend::Backend;

/// Run the board poller.
///
/// Fetches once at startup, then on every tick of the current cadence. A
/// cadence change fetches immediately and restarts the wait with the new
/// interval.
pub async fn run<M, F, S, Fut>(
    backend: Arc<dyn Backend>,
    mut cadence: watch::Receiver<Cadence>,
    tx: mpsc::UnboundedSender<M>,
    wrap: F,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    F: Fn(Result<QueueSnapshot, MonitorError>) -> M,
    S: Fn(Duration) -> Fut,
    Fut: Future<Output = ()>,
{
    info!("Board poller starting...");

    loop {
        debug!("Fetching queue board...");
        let result = backend.get_queue_snapshot().await;
        if tx.send(wrap(result)).is_err() {
            info!("Board poller receiver dropped, stopping...");
            return;
        }

        let interval = cadence.borrow_and_update().interval();
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Board poller shutting down...");
                return;
            }
            changed = cadence.changed() => {
                if changed.is_err() {
                    info!("Board cadence sender dropped, stopping...");
                    return;
                }
                debug!("Board cadence changed");
            }
            _ = sleep_fn(interval) => {}
        }
    }
}
