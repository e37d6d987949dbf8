//! Log stream client and the [`Backend`] implementation over HTTP

use async_trait::async_trait;
use futures::{stream, StreamExt};
use refresh_api::{JobStatus, QueueSnapshot, SubmitResponse};

use crate::errors::MonitorError;
use crate::http::backend::{Backend, PayloadStream};
use crate::http::client::HttpClient;
use crate::stream::sse::SseDecoder;

pub const LOGS_PATH: &str = "/logs";

impl HttpClient {
    /// Open the server-sent log stream of a job
    pub async fn open_log_stream(&self, job_id: Option<&str>) -> Result<PayloadStream, MonitorError> {
        let response = self.get_stream(LOGS_PATH, job_id).await?;

        let mut decoder = SseDecoder::new();
        let payloads = response
            .bytes_stream()
            .map(move |chunk| match chunk {
                Ok(bytes) => decoder
                    .push(&bytes)
                    .into_iter()
                    .map(Ok)
                    .collect::<Vec<_>>(),
                Err(e) => vec![Err(MonitorError::StreamError(e.to_string()))],
            })
            .flat_map(stream::iter);

        Ok(Box::pin(payloads))
    }
}

#[async_trait]
impl Backend for HttpClient {
    async fn submit_job(&self) -> Result<SubmitResponse, MonitorError> {
        HttpClient::submit_job(self).await
    }

    async fn get_status(&self, job_id: Option<&str>) -> Result<JobStatus, MonitorError> {
        self.get_job_status(job_id).await
    }

    async fn open_log_stream(&self, job_id: Option<&str>) -> Result<PayloadStream, MonitorError> {
        HttpClient::open_log_stream(self, job_id).await
    }

    async fn get_queue_snapshot(&self) -> Result<QueueSnapshot, MonitorError> {
        HttpClient::get_queue_snapshot(self).await
    }
}
