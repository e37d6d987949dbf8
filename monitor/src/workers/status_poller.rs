//! Status polling worker for the primary job

use std::sync::Arc;
use std::time::Duration;

use refresh_api::JobStatus;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::errors::MonitorError;
use crate::http::backend::Backend;

/// Interval between status requests
pub const STATUS_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Periodic status requests for one job. Results, including failures, are
/// delivered to the owner; the poller itself never retries early or stops on
/// error.
#[derive(Default)]
pub struct StatusPoller {
    handle: Option<JoinHandle<()>>,
}

impl StatusPoller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start polling, replacing any previous loop
    pub fn start<M, F>(
        &mut self,
        backend: Arc<dyn Backend>,
        job_id: Option<String>,
        tx: mpsc::UnboundedSender<M>,
        wrap: F,
    ) where
        M: Send + 'static,
        F: Fn(Result<JobStatus, MonitorError>) -> M + Send + 'static,
    {
        self.stop();
        info!("Starting status poller for job {:?}", job_id);

        self.handle = Some(tokio::spawn(async move {
            loop {
                tokio::time::sleep(STATUS_POLL_INTERVAL).await;
                debug!("Polling status of job {:?}", job_id);
                let result = backend.get_status(job_id.as_deref()).await;
                if tx.send(wrap(result)).is_err() {
                    return;
                }
            }
        }));
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stop polling. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            debug!("Stopping status poller");
            handle.abort();
        }
    }
}

impl Drop for StatusPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
