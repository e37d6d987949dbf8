//! Backend seam used by the monitor

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use refresh_api::{JobStatus, QueueSnapshot, SubmitResponse};

use crate::errors::MonitorError;

/// Raw SSE `data` payloads of one log stream connection. The stream ends when
/// the server closes the connection.
pub type PayloadStream = Pin<Box<dyn Stream<Item = Result<String, MonitorError>> + Send>>;

/// Operations the monitor consumes from the job backend
#[async_trait]
pub trait Backend: Send + Sync {
    /// Enqueue a new refresh job
    async fn submit_job(&self) -> Result<SubmitResponse, MonitorError>;

    /// Status of a job, or of the backend's current job when `job_id` is `None`
    async fn get_status(&self, job_id: Option<&str>) -> Result<JobStatus, MonitorError>;

    /// Open a push stream of log payloads for a job
    async fn open_log_stream(&self, job_id: Option<&str>) -> Result<PayloadStream, MonitorError>;

    async fn get_queue_snapshot(&self) -> Result<QueueSnapshot, MonitorError>;
}
