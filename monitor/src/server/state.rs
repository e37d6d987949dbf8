//! Server state

use std::sync::Arc;

use crate::view::store::ViewStore;
use crate::workers::monitor::MonitorHandle;

/// Server state shared across handlers
pub struct ServerState {
    pub monitor: MonitorHandle,
    pub store: Arc<ViewStore>,
}

impl ServerState {
    pub fn new(monitor: MonitorHandle, store: Arc<ViewStore>) -> Self {
        Self { monitor, store }
    }
}
