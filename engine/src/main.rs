//! KWS Agent - Entry Point
//!
//! Per-server sidecar exposing the local container runtime to the control
//! panel's deployment engine.

use std::collections::HashMap;
use std::env;
use std::sync::Arc;

use kws_engine::logs::{init_logging, LogOptions};
use kws_engine::runtime::DockerCli;
use kws_engine::server::{serve, AgentState, ServerOptions};
use kws_engine::storage::layout::StorageLayout;
use kws_engine::storage::settings::Settings;
use kws_engine::utils::version_info;

use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
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
    let version = version_info();
    if cli_args.contains_key("version") {
        match serde_json::to_string_pretty(&version) {
            Ok(json) => println!("{}", json),
            Err(e) => eprintln!("Failed to render version: {e}"),
        }
        return;
    }

    let layout = match cli_args.get("config") {
        Some(dir) => StorageLayout::new(dir),
        None => StorageLayout::default(),
    };

    // Retrieve the settings file; a missing file means defaults
    let settings_file = layout.settings_file();
    let settings = if settings_file.exists().await {
        match settings_file.read_json::<Settings>().await {
            Ok(settings) => settings,
            Err(e) => {
                eprintln!("Unable to read settings file {}: {e}", settings_file.path().display());
                return;
            }
        }
    } else {
        Settings::default()
    };
    let settings = settings.with_env_overrides();

    // Initialize logging
    let log_options = LogOptions {
        log_level: settings.log_level.clone(),
        log_dir: cli_args
            .contains_key("log-to-file")
            .then(|| layout.logs_dir().path().to_path_buf()),
        json_format: cli_args.contains_key("json-logs"),
        ..Default::default()
    };
    let _log_guard = match init_logging(log_options) {
        Ok(guard) => guard,
        Err(e) => {
            println!("Failed to initialize logging: {e}");
            None
        }
    };

    if settings.agent.token.is_none() {
        warn!("No agent token configured, container endpoints are unauthenticated");
    }

    let state = Arc::new(AgentState::new(
        Arc::new(DockerCli::default()),
        settings.agent.token.clone(),
        settings.agent.server_name.clone(),
    ));
    let options = ServerOptions {
        host: settings.agent.host.clone(),
        port: settings.agent.port,
    };

    info!("Running KWS agent {} as {}", version.version, settings.agent.server_name);
    let handle = match serve(&options, state, await_shutdown_signal()).await {
        Ok(handle) => handle,
        Err(e) => {
            error!("Failed to start the agent: {e}");
            return;
        }
    };

    match handle.await {
        Ok(Ok(())) => info!("Agent stopped"),
        Ok(Err(e)) => error!("Agent server failed: {e}"),
        Err(e) => error!("Agent server task panicked: {e}"),
    }
}

async fn await_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
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
