//! Job API client

use refresh_api::{JobStatus, QueueSnapshot, SubmitResponse};

use crate::errors::MonitorError;
use crate::http::client::HttpClient;

pub const SUBMIT_PATH: &str = "/update";
pub const STATUS_PATH: &str = "/status";
pub const QUEUE_PATH: &str = "/queue";

impl HttpClient {
    /// Enqueue a refresh job
    pub async fn submit_job(&self) -> Result<SubmitResponse, MonitorError> {
        self.get(SUBMIT_PATH, None).await
    }

    /// Get the status of a job
    pub async fn get_job_status(&self, job_id: Option<&str>) -> Result<JobStatus, MonitorError> {
        self.get(STATUS_PATH, job_id).await
    }

    /// Get the queue board snapshot
    pub async fn get_queue_snapshot(&self) -> Result<QueueSnapshot, MonitorError> {
        self.get(QUEUE_PATH, None).await
    }
}
