//! HTTP client implementation

use std::time::Duration;

use reqwest::{header, Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, error};
use url::Url;

use crate::errors::MonitorError;
use crate::utils::preview;

/// Default timeout applied to one-shot requests
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for backend communication
pub struct HttpClient {
    client: Client,
    /// Separate client without a total timeout, used for long-lived streams
    stream_client: Client,
    base_url: Url,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(base_url: &str) -> Result<Self, MonitorError> {
        Self::with_timeout(base_url, DEFAULT_REQUEST_TIMEOUT)
    }

    /// Create a new HTTP client with a custom timeout for one-shot requests
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, MonitorError> {
        let base_url = parse_base_url(base_url)?;

        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        let stream_client = Client::builder().connect_timeout(CONNECT_TIMEOUT).build()?;

        Ok(Self {
            client,
            stream_client,
            base_url,
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Build the URL of an endpoint, optionally scoped to a job
    pub fn endpoint(&self, path: &str, job_id: Option<&str>) -> Result<Url, MonitorError> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| MonitorError::ConfigError(format!("invalid endpoint {}: {}", path, e)))?;
        if let Some(job_id) = job_id {
            url.query_pairs_mut().append_pair("job_id", job_id);
        }
        Ok(url)
    }

    /// Make a GET request and decode a JSON body
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        job_id: Option<&str>,
    ) -> Result<T, MonitorError> {
        let url = self.endpoint(path, job_id)?;
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let response = ensure_success("GET", response).await?;
        let body = response.json().await?;
        Ok(body)
    }

    /// Open a GET request whose body is consumed as a stream
    pub async fn get_stream(
        &self,
        path: &str,
        job_id: Option<&str>,
    ) -> Result<Response, MonitorError> {
        let url = self.endpoint(path, job_id)?;
        debug!("GET {} (stream)", url);

        let response = self
            .stream_client
            .get(url)
            .header(header::ACCEPT, "text/event-stream")
            .header(header::CACHE_CONTROL, "no-cache")
            .send()
            .await?;

        ensure_success("GET", response).await
    }
}

/// The base URL is treated as a directory so relative endpoints are appended
fn parse_base_url(raw: &str) -> Result<Url, MonitorError> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| MonitorError::ConfigError(format!("invalid backend URL {}: {}", raw, e)))?;

    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(MonitorError::ConfigError(format!(
                "unsupported backend URL scheme: {}",
                other
            )))
        }
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

async fn ensure_success(method: &str, response: Response) -> Result<Response, MonitorError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error!("HTTP {} failed: {} - {}", method, status, preview(&body, 256));
    Err(MonitorError::BackendError(format!(
        "{}: {}",
        status,
        preview(&body, 256)
    )))
}
