//! Reconnecting log stream connector

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::http::backend::Backend;
use crate::stream::processor::{LogProcessor, StreamOutput};

/// Fixed delay before reopening a dropped stream
pub const RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Events a connector delivers to its owner
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    Connected,

    /// Processed outputs of one payload, in entry order
    Outputs(Vec<StreamOutput>),

    /// The connection dropped; a new attempt follows after `retry_in`
    Disconnected { reason: String, retry_in: Duration },
}

/// One log stream for one job. The processor, and with it the dedup set and
/// summary buffer, lives for the whole connector and survives reconnects.
///
/// Retries are unbounded until [`LogConnector::close`] is called or the
/// connector is dropped.
pub struct LogConnector {
    job_id: Option<String>,
    handle: Option<JoinHandle<()>>,
}

impl LogConnector {
    pub fn open<M, F>(
        backend: Arc<dyn Backend>,
        job_id: Option<String>,
        processor: LogProcessor,
        tx: mpsc::UnboundedSender<M>,
        wrap: F,
    ) -> Self
    where
        M: Send + 'static,
        F: Fn(StreamEvent) -> M + Send + 'static,
    {
        info!("Opening log stream for job {:?}", job_id);
        let handle = tokio::spawn(run(backend, job_id.clone(), processor, tx, wrap));
        Self {
            job_id,
            handle: Some(handle),
        }
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    pub fn is_open(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop the connector. Safe to call repeatedly.
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("Closing log stream for job {:?}", self.job_id);
            handle.abort();
        }
    }
}

impl Drop for LogConnector {
    fn drop(&mut self) {
        self.close();
    }
}

async fn run<M, F>(
    backend: Arc<dyn Backend>,
    job_id: Option<String>,
    mut processor: LogProcessor,
    tx: mpsc::UnboundedSender<M>,
    wrap: F,
) where
    F: Fn(StreamEvent) -> M,
{
    loop {
        let reason = match backend.open_log_stream(job_id.as_deref()).await {
            Ok(mut payloads) => {
                if tx.send(wrap(StreamEvent::Connected)).is_err() {
                    return;
                }

                loop {
                    match payloads.next().await {
                        Some(Ok(data)) => match processor.process_payload(&data) {
                            Ok(outputs) if outputs.is_empty() => {}
                            Ok(outputs) => {
                                if tx.send(wrap(StreamEvent::Outputs(outputs))).is_err() {
                                    return;
                                }
                            }
                            Err(e) => debug!("Dropping malformed payload: {}", e),
                        },
                        Some(Err(e)) => break e.to_string(),
                        None => break "stream closed by server".to_string(),
                    }
                }
            }
            Err(e) => e.to_string(),
        };

        warn!(
            "Log stream for job {:?} lost ({}), reconnecting in {:?}",
            job_id, reason, RECONNECT_DELAY
        );
        let event = StreamEvent::Disconnected {
            reason,
            retry_in: RECONNECT_DELAY,
        };
        if tx.send(wrap(event)).is_err() {
            return;
        }

        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}
