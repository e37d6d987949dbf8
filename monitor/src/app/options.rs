//! Application configuration options

use std::time::Duration;

use crate::http::client::DEFAULT_REQUEST_TIMEOUT;
use crate::inspector::InspectTarget;

/// What the monitor does once started
#[derive(Debug, Clone, PartialEq)]
pub enum Mode {
    /// Long-running monitor driven through the view server
    Serve,

    /// Submit one job and follow it to settlement
    Run,

    /// Stream one job's log until interrupted
    Inspect(InspectTarget),
}

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    pub mode: Mode,

    /// Backend API base URL
    pub backend_base_url: String,

    /// Timeout of one-shot backend requests
    pub request_timeout: Duration,

    /// Enable the local view server
    pub enable_view_server: bool,

    /// Enable the queue board poller
    pub enable_board_poller: bool,

    /// Print the view to the terminal
    pub console_output: bool,

    /// Print queue board changes to the terminal
    pub console_board: bool,

    /// Server configuration
    pub server: ServerOptions,

    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            mode: Mode::Serve,
            backend_base_url: "http://127.0.0.1:5000/api".to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            enable_view_server: true,
            enable_board_poller: true,
            console_output: true,
            console_board: true,
            server: ServerOptions::default(),
            max_shutdown_delay: Duration::from_secs(10),
        }
    }
}

/// Local HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8090,
        }
    }
}
