//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::errors::MonitorError;
use crate::http::backend::Backend;
use crate::http::client::HttpClient;
use crate::stream::ignore::IgnoreFilter;
use crate::view::console::ConsoleRenderer;
use crate::view::store::ViewStore;
use crate::view::Fanout;
use crate::workers::monitor::{Monitor, MonitorHandle};

/// Main application state
pub struct AppState {
    /// Job backend
    pub backend: Arc<dyn Backend>,

    /// Latest projected view
    pub store: Arc<ViewStore>,

    /// Front end of the monitor actor
    pub handle: MonitorHandle,
}

impl AppState {
    /// Initialize application state. The returned monitor still has to be
    /// run.
    pub fn init(options: &AppOptions) -> Result<(Self, Monitor), MonitorError> {
        info!("Initializing application state...");

        let client = HttpClient::with_timeout(&options.backend_base_url, options.request_timeout)?;
        info!("Using backend at {}", client.base_url());
        let backend: Arc<dyn Backend> = Arc::new(client);

        Ok(Self::with_backend(backend, options))
    }

    /// Build the state around an existing backend
    pub fn with_backend(backend: Arc<dyn Backend>, options: &AppOptions) -> (Self, Monitor) {
        let store = Arc::new(ViewStore::new());

        let mut renderer = Fanout::new().with(store.clone());
        if options.console_output {
            renderer = renderer.with(Arc::new(ConsoleRenderer::new(options.console_board)));
        }

        let (monitor, handle) =
            Monitor::new(backend.clone(), Arc::new(renderer), IgnoreFilter::default());

        let state = Self {
            backend,
            store,
            handle,
        };
        (state, monitor)
    }
}
