mod cli;

use std::sync::Arc;

use clap::Parser;
use color_eyre::Result;
use picpost_core::store::RecordStore;
use picpost_server::{config, routes, storage};
use picpost_service::RecordService;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Command, ConfigCommand};

/// Entry point wiring the CLI to the HTTP server.
#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = match &cli.config {
        Some(path) => config::load_from_path(path)?,
        None => config::load()?,
    };
    match cli.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => serve(&config, bind).await?,
        Command::Version => print_version(),
        Command::Health => run_health_check(&config).await?,
        Command::Config(ConfigCommand::Init) => init_config(cli.config)?,
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info to avoid noisy stdout.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("picpost {}", env!("CARGO_PKG_VERSION"));
}

/// Connect the store once, then serve every request from the same handle.
async fn serve(config: &config::Config, bind: Option<String>) -> Result<()> {
    info!("picpost v{} starting", env!("CARGO_PKG_VERSION"));

    let store = storage::store_from_config(config)?;
    store
        .ping()
        .await
        .map_err(|e| color_eyre::eyre::eyre!("couldn't connect to the record store: {e}"))?;
    info!("connected to record store");

    let settings = storage::settings_from_config(config);
    let service = Arc::new(RecordService::new(store, &settings)?);
    let app = routes::build_router(service);

    let addr = bind.unwrap_or_else(|| config.bind_address());
    let listener = TcpListener::bind(&addr).await?;
    info!("listening on {}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Runs a quick reachability check of the configured store.
async fn run_health_check(config: &config::Config) -> Result<()> {
    let store = storage::store_from_config(config)?;
    run_store_health(&store).await?;
    println!("Store: ok");
    Ok(())
}

async fn run_store_health<S: RecordStore>(store: &S) -> Result<()> {
    store
        .ping()
        .await
        .map_err(|e| color_eyre::eyre::eyre!(e.to_string()))
}

fn init_config(path: Option<std::path::PathBuf>) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => config::default_path()?,
    };
    let path = config::write_template_if_missing(&path)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}
