//! ht-monitor service - sensor ingestion and dashboard API.
//!
//! Run with: `cargo run -p ht-service`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use clap::{Parser, Subcommand};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use ht_service::{AppState, Config, SettingsStore, api};
use ht_store::Store;

/// ht-monitor service - sensor ingestion and dashboard API.
#[derive(Parser, Debug)]
#[command(name = "ht-service")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long, global = true)]
    bind: Option<String>,

    /// Database path (overrides config).
    #[arg(short, long, global = true)]
    database: Option<PathBuf>,

    /// Settings template used on first start (overrides config).
    #[arg(short, long, global = true)]
    template: Option<PathBuf>,

    /// Disable the device sync countdown.
    #[arg(long, global = true)]
    no_sync_timer: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the service in the foreground (default behavior).
    Run,

    /// Write the dashboard settings to a JSON file.
    ExportConfig {
        /// Destination file.
        path: PathBuf,
    },

    /// Replace the dashboard settings from a JSON file.
    ImportConfig {
        /// Source file.
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("ht_service=info".parse()?)
                .add_directive("tower_http=debug".parse()?),
        )
        .init();

    let config = load_config(&args)?;

    match args.command {
        Some(Command::ExportConfig { ref path }) => {
            let settings = open_settings(&config)?;
            settings.export_to_file(path).await?;
            println!("Exported settings to {}", path.display());
            Ok(())
        }
        Some(Command::ImportConfig { ref path }) => {
            let settings = open_settings(&config)?;
            let imported = settings.import_from_file(path).await?;
            println!(
                "Imported settings from {} ({} devices)",
                path.display(),
                imported.devices.len()
            );
            Ok(())
        }
        Some(Command::Run) | None => run_server(config, args.no_sync_timer).await,
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default().unwrap_or_default(),
    };

    // Override config with CLI args
    if let Some(bind) = &args.bind {
        config.server.bind = bind.clone();
    }
    if let Some(db_path) = &args.database {
        config.storage.path = db_path.clone();
    }
    if let Some(template) = &args.template {
        config.settings.template = Some(template.clone());
    }

    config.validate()?;
    Ok(config)
}

fn open_settings(config: &Config) -> anyhow::Result<SettingsStore> {
    let store = Store::open(&config.storage.path)?;
    Ok(SettingsStore::new(
        Arc::new(Mutex::new(store)),
        config.settings.template.clone(),
    ))
}

async fn run_server(config: Config, no_sync_timer: bool) -> anyhow::Result<()> {
    info!("Opening database at {:?}", config.storage.path);
    let store = Store::open(&config.storage.path)?;

    let addr: SocketAddr = config.server.bind.parse()?;
    let state = AppState::new(store, config);

    match state.settings.load().await {
        Ok(settings) => {
            if let Some(message) = settings.extra.get("startup_message").and_then(|v| v.as_str()) {
                info!("{}", message);
            }
        }
        Err(e) => tracing::warn!("Dashboard settings unavailable: {}", e),
    }

    let cancel = CancellationToken::new();

    if no_sync_timer {
        info!("Sync timer disabled");
    } else {
        let state = Arc::clone(&state);
        let cancel = cancel.clone();
        tokio::spawn(async move { state.sync.run(&state.settings, cancel).await });
    }

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Shutdown requested");
            }
            cancel.cancel();
        });
    }

    let app = Router::new()
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await?;

    info!("Server stopped");
    Ok(())
}
