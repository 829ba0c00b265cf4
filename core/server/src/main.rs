//! Recital display server entrypoint.
//!
//! A single-writer service for one LAN: display screens connect as viewers,
//! phones connect as controllers, and exactly one controller at a time drives
//! what every screen shows. Static client assets are served from the same port.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::get;
use axum::Router;
use clap::Parser;
use recital_core::{load_config, Coordinator, CoordinatorSettings, Library, RecitalConfig};
use tower_http::services::ServeDir;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod api;
mod state;
mod ws;

use state::SharedState;

#[derive(Parser)]
#[command(name = "recital-server")]
#[command(about = "LAN display server for recitation")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.recital/server.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long)]
    host: Option<String>,

    #[arg(long)]
    port: Option<u16>,

    /// Directory holding scripture.json and supplications.json
    #[arg(long, value_name = "DIR")]
    content_dir: Option<PathBuf>,

    /// Directory served at / for the display and remote clients
    #[arg(long, value_name = "DIR")]
    static_dir: Option<PathBuf>,
}

impl Cli {
    fn apply(self, config: &mut RecitalConfig) {
        if let Some(host) = self.host {
            config.server.host = host;
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(dir) = self.content_dir {
            config.content.dir = dir;
        }
        if let Some(dir) = self.static_dir {
            config.server.static_dir = dir;
        }
    }
}

#[tokio::main]
async fn main() {
    init_logging();
    let cli = Cli::parse();

    let mut config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            warn!(error = %err, "Failed to load config; using defaults");
            RecitalConfig::default()
        }
    };
    cli.apply(&mut config);

    let library = Library::load(&config.content.dir);
    let coordinator = Coordinator::new(Arc::new(library), CoordinatorSettings::from_config(&config));
    let shared_state = Arc::new(SharedState::new(coordinator));
    spawn_liveness_ticker(Arc::clone(&shared_state), config.control.liveness_interval());

    if !config.server.static_dir.is_dir() {
        warn!(
            path = %config.server.static_dir.display(),
            "Static directory not found; only the API and WebSocket are served"
        );
    }

    let app = Router::new()
        .route("/ws", get(ws::upgrade))
        .route("/api/bootstrap", get(api::bootstrap))
        .route("/api/health", get(api::health))
        .fallback_service(ServeDir::new(&config.server.static_dir))
        .with_state(shared_state);

    let bind_target = (config.server.host.as_str(), config.server.port);
    let listener = match tokio::net::TcpListener::bind(bind_target).await {
        Ok(listener) => listener,
        Err(err) => {
            error!(
                error = %err,
                host = %config.server.host,
                port = config.server.port,
                "Failed to bind server port"
            );
            std::process::exit(1);
        }
    };
    let addr = listener
        .local_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| format!("{}:{}", config.server.host, config.server.port));

    info!(
        addr = %addr,
        base_url = %config.server.base_url(),
        controller_timeout_secs = config.control.controller_timeout_secs,
        "Recital server started"
    );

    if let Err(err) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %err, "Server terminated unexpectedly");
        std::process::exit(1);
    }
    info!("Recital server stopped");
}

fn spawn_liveness_ticker(state: Arc<SharedState>, interval: std::time::Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            state.tick();
        }
    });
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

fn init_logging() {
    let debug_enabled = env::var("RECITAL_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
