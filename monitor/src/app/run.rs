//! Main application run loop

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::app::options::{AppOptions, Mode};
use crate::app::state::AppState;
use crate::board::QueueBoard;
use crate::errors::MonitorError;
use crate::http::client::HttpClient;
use crate::server::serve::serve;
use crate::server::state::ServerState;
use crate::session::fsm::Settlement;
use crate::view::console::ConsoleRenderer;
use crate::view::Renderer;
use crate::workers::board_poller;
use crate::workers::monitor::{Monitor, MonitorHandle, MonitorMessage};

/// Run the refresh monitor.
///
/// In [`Mode::Run`] the settlement of the submitted job is returned; the
/// other modes run until `shutdown_signal` resolves.
pub async fn run(
    options: AppOptions,
    shutdown_signal: impl Future<Output = ()> + Send + 'static,
) -> Result<Option<Settlement>, MonitorError> {
    info!("Initializing refresh monitor...");

    // Create shutdown channel
    let (shutdown_tx, _shutdown_rx): (broadcast::Sender<()>, _) = broadcast::channel(1);
    let mut shutdown_manager = ShutdownManager::new(shutdown_tx.clone(), options.max_shutdown_delay);

    let app_state = match init(&options, &shutdown_tx, &mut shutdown_manager).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to start the monitor: {}", e);
            shutdown_manager.shutdown().await?;
            return Err(e);
        }
    };

    tokio::pin!(shutdown_signal);
    let result = match &options.mode {
        Mode::Serve => {
            (&mut shutdown_signal).await;
            info!("Shutdown signal received, shutting down...");
            Ok(None)
        }
        Mode::Run => {
            tokio::select! {
                _ = &mut shutdown_signal => {
                    info!("Shutdown signal received before the job settled");
                    Ok(None)
                }
                result = follow_job(&app_state.handle) => result.map(Some),
            }
        }
        Mode::Inspect(target) => match app_state.handle.open_inspector(target.clone()) {
            Ok(()) => {
                (&mut shutdown_signal).await;
                info!("Shutdown signal received, shutting down...");
                Ok(None)
            }
            Err(e) => Err(e),
        },
    };

    // Shutdown
    drop(shutdown_tx);
    shutdown_manager.shutdown().await?;
    result
}

/// Submit a job and wait for its settlement
async fn follow_job(handle: &MonitorHandle) -> Result<Settlement, MonitorError> {
    let generation = handle.start_job().await?;
    handle.wait_settled(generation).await
}

/// Fetch one queue snapshot and print it
pub async fn print_queue(options: &AppOptions) -> Result<(), MonitorError> {
    let client = HttpClient::with_timeout(&options.backend_base_url, options.request_timeout)?;
    let snapshot = client.get_queue_snapshot().await?;

    let mut board = QueueBoard::default();
    board.replace(snapshot);
    ConsoleRenderer::new(true).render_board(&board);
    Ok(())
}

// =============================== INITIALIZATION ================================== //

async fn init(
    options: &AppOptions,
    shutdown_tx: &broadcast::Sender<()>,
    shutdown_manager: &mut ShutdownManager,
) -> Result<AppState, MonitorError> {
    let (app_state, monitor) = AppState::init(options)?;

    if options.enable_board_poller {
        init_board_poller(
            &app_state,
            &monitor,
            shutdown_manager,
            shutdown_tx.subscribe(),
        )?;
    }

    init_monitor(monitor, shutdown_manager, shutdown_tx.subscribe())?;

    if options.enable_view_server {
        init_view_server(options, &app_state, shutdown_manager, shutdown_tx.subscribe()).await?;
    }

    Ok(app_state)
}

fn init_monitor(
    monitor: Monitor,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), MonitorError> {
    info!("Initializing monitor...");

    let monitor_handle = tokio::spawn(monitor.run(Box::pin(async move {
        let _ = shutdown_rx.recv().await;
    })));

    shutdown_manager.with_monitor_handle(monitor_handle)
}

fn init_board_poller(
    app_state: &AppState,
    monitor: &Monitor,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), MonitorError> {
    info!("Initializing board poller...");

    let backend = app_state.backend.clone();
    let cadence = monitor.cadence();
    let tx = app_state.handle.sender();

    let board_handle = tokio::spawn(async move {
        board_poller::run(
            backend,
            cadence,
            tx,
            MonitorMessage::Board,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = shutdown_rx.recv().await;
            }),
        )
        .await;
    });

    shutdown_manager.with_board_poller_handle(board_handle)
}

async fn init_view_server(
    options: &AppOptions,
    app_state: &AppState,
    shutdown_manager: &mut ShutdownManager,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), MonitorError> {
    info!("Initializing view server...");

    let server_state = ServerState::new(app_state.handle.clone(), app_state.store.clone());

    let server_handle = serve(&options.server, Arc::new(server_state), async move {
        let _ = shutdown_rx.recv().await;
    })
    .await?;

    shutdown_manager.with_view_server_handle(server_handle)
}

// ================================= SHUTDOWN ===================================== //

struct ShutdownManager {
    shutdown_tx: broadcast::Sender<()>,
    max_shutdown_delay: Duration,
    view_server_handle: Option<JoinHandle<Result<(), MonitorError>>>,
    board_poller_handle: Option<JoinHandle<()>>,
    monitor_handle: Option<JoinHandle<()>>,
}

impl ShutdownManager {
    pub fn new(shutdown_tx: broadcast::Sender<()>, max_shutdown_delay: Duration) -> Self {
        Self {
            shutdown_tx,
            max_shutdown_delay,
            view_server_handle: None,
            board_poller_handle: None,
            monitor_handle: None,
        }
    }

    pub fn with_monitor_handle(&mut self, handle: JoinHandle<()>) -> Result<(), MonitorError> {
        if self.monitor_handle.is_some() {
            return Err(MonitorError::ShutdownError("monitor_handle already set".to_string()));
        }
        self.monitor_handle = Some(handle);
        Ok(())
    }

    pub fn with_board_poller_handle(&mut self, handle: JoinHandle<()>) -> Result<(), MonitorError> {
        if self.board_poller_handle.is_some() {
            return Err(MonitorError::ShutdownError("board_poller_handle already set".to_string()));
        }
        self.board_poller_handle = Some(handle);
        Ok(())
    }

    pub fn with_view_server_handle(
        &mut self,
        handle: JoinHandle<Result<(), MonitorError>>,
    ) -> Result<(), MonitorError> {
        if self.view_server_handle.is_some() {
            return Err(MonitorError::ShutdownError("view_server_handle already set".to_string()));
        }
        self.view_server_handle = Some(handle);
        Ok(())
    }

    pub async fn shutdown(&mut self) -> Result<(), MonitorError> {
        let _ = self.shutdown_tx.send(());

        match tokio::time::timeout(self.max_shutdown_delay, self.shutdown_impl()).await {
            Ok(result) => result,
            Err(_) => {
                error!(
                    "Shutdown timed out after {:?}, forcing shutdown...",
                    self.max_shutdown_delay
                );
                std::process::exit(1);
            }
        }
    }

    async fn shutdown_impl(&mut self) -> Result<(), MonitorError> {
        info!("Shutting down refresh monitor...");

        // 1. View server
        if let Some(handle) = self.view_server_handle.take() {
            handle.await.map_err(|e| MonitorError::ShutdownError(e.to_string()))??;
        }

        // 2. Board poller
        if let Some(handle) = self.board_poller_handle.take() {
            handle.await.map_err(|e| MonitorError::ShutdownError(e.to_string()))?;
        }

        // 3. Monitor, which closes its connectors and pollers
        if let Some(handle) = self.monitor_handle.take() {
            handle.await.map_err(|e| MonitorError::ShutdownError(e.to_string()))?;
        }

        info!("Shutdown complete");
        Ok(())
    }
}
