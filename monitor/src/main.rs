//! Refresh Monitor - Entry Point
//!
//! Follows data-refresh jobs on the backend: their status, their live log and
//! the job queue.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use refresh_monitor::app::options::{AppOptions, Mode, ServerOptions};
use refresh_monitor::app::run::{print_queue, run};
use refresh_monitor::inspector::InspectTarget;
use refresh_monitor::logs::{init_logging, LogOptions};
use refresh_monitor::storage::settings::load_settings;
use refresh_monitor::utils::version_info;

use tracing::{error, info};

const DEFAULT_CONFIG_FILE: &str = "refreshmon.json";

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args: Vec<String> = env::args().collect();
    let mut cli_args: HashMap<String, String> = HashMap::new();

    for arg in args.iter().skip(1) {
        if let Some((key, value)) = arg.split_once('=') {
            // Handle --key=value format
            let clean_key = key.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), value.to_string());
        } else if arg.starts_with("--") {
            // Handle standalone flags like --version
            let clean_key = arg.trim_start_matches('-');
            cli_args.insert(clean_key.to_string(), "true".to_string());
        }
    }

    // Print version and exit
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version_info()) {
            Ok(version) => println!("{}", version),
            Err(e) => eprintln!("Failed to render version: {e}"),
        }
        return ExitCode::SUCCESS;
    }

    // Retrieve the settings file
    let config_path = cli_args
        .get("config")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    let settings = match load_settings(&config_path).await {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Unable to read settings file: {e}");
            return ExitCode::FAILURE;
        }
    };

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        log_dir: settings.log_dir.clone(),
        json_format: settings.log_json,
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    let mode = if let Some(job_id) = cli_args.get("inspect") {
        Mode::Inspect(InspectTarget {
            job_id: job_id.clone(),
            enqueued_at: None,
        })
    } else if cli_args.contains_key("run") {
        Mode::Run
    } else {
        Mode::Serve
    };

    let options = AppOptions {
        backend_base_url: cli_args
            .get("base-url")
            .cloned()
            .unwrap_or_else(|| settings.backend.base_url.clone()),
        request_timeout: Duration::from_secs(settings.backend.request_timeout_secs),
        enable_view_server: mode == Mode::Serve && settings.view_server.enabled,
        enable_board_poller: !matches!(mode, Mode::Inspect(_)),
        console_output: settings.console_output,
        console_board: mode == Mode::Serve,
        server: ServerOptions {
            host: settings.view_server.host.clone(),
            port: settings.view_server.port,
        },
        mode,
        ..Default::default()
    };

    // One-shot queue listing
    if cli_args.contains_key("queue") {
        return match print_queue(&options).await {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                error!("Failed to fetch the queue: {e}");
                ExitCode::FAILURE
            }
        };
    }

    info!("Running refresh monitor with options: {:?}", options);
    match run(options, await_shutdown_signal()).await {
        Ok(Some(settlement)) if settlement.is_failure() => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Failed to run the monitor: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) = match (
            signal(SignalKind::terminate()),
            signal(SignalKind::interrupt()),
        ) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            _ => {
                error!("Failed to install signal handlers, falling back to Ctrl+C");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = sigterm.recv() => {
                info!("SIGTERM received, shutting down...");
            }
            _ = sigint.recv() => {
                info!("SIGINT received, shutting down...");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl+C received, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {e}");
        }
        info!("Ctrl+C received, shutting down...");
    }
}
