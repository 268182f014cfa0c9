mod api;
mod config;
mod plugins_cmd;
mod run_cmd;
mod terminal_output;
mod validate_cmd;
mod wiring;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use genforge_config::{config_dir, config_file_path, load_with_report};
use genforge_logging::init_logger;

use api::AppState;
use config::Settings;

#[derive(Parser)]
#[command(name = "genforge")]
#[command(about = "GenForge — generation orchestration runtime")]
#[command(version)]
struct Cli {
    /// Config file (default: $GENFORGE_CONFIG_DIR/config.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// List registered plugins
    Plugins {
        /// Print descriptors, including request schemas, as JSON
        #[arg(long)]
        json: bool,
    },
    /// Run one generation request to completion
    Run {
        /// Plugin id, e.g. `video-generation`
        plugin: String,
        /// Request body as JSON; plain text is sent as a string
        request: String,
    },
    /// Check the config file and referenced env vars
    ValidateConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli
        .config
        .unwrap_or_else(|| config_file_path(&config_dir()));

    match cli.command {
        Commands::ValidateConfig => validate_cmd::run(&config_path).await?,
        Commands::Serve { port } => {
            let (config, report) = load_with_report(&config_path).await?;
            let settings = Settings::resolve(&config);
            let _guard = init_logger(settings.log_dir.as_deref(), &settings.log_level)?;
            report.enforce(&config_path)?;
            let settings = Settings {
                port: port.unwrap_or(settings.port),
                ..settings
            };
            let orchestrator = wiring::build_orchestrator(&config)?;
            run_server(settings, orchestrator).await?;
        }
        Commands::Plugins { json } => {
            let (config, report) = load_with_report(&config_path).await?;
            let _guard = init_logger(None, "warn")?;
            report.enforce(&config_path)?;
            let registry = wiring::build_registry(&config)?;
            plugins_cmd::run(&registry, json)?;
        }
        Commands::Run { plugin, request } => {
            let (config, report) = load_with_report(&config_path).await?;
            let settings = Settings::resolve(&config);
            let _guard = init_logger(settings.log_dir.as_deref(), "warn")?;
            report.enforce(&config_path)?;
            let orchestrator = wiring::build_orchestrator(&config)?;
            run_cmd::run(&orchestrator, &plugin, &request).await?;
        }
    }

    Ok(())
}

async fn run_server(settings: Settings, orchestrator: genforge_orchestrator::Orchestrator) -> Result<()> {
    info!(
        port = settings.port,
        bind = %settings.bind_address,
        plugins = orchestrator.registry().len(),
        "Starting GenForge runtime"
    );

    let state = Arc::new(AppState { orchestrator });
    let app = api::build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());
    let addr = format!("{}:{}", settings.bind_address, settings.port);

    let listener = TcpListener::bind(&addr).await?;
    info!(addr = %addr, "HTTP API listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    Ok(())
}
