//! beatline-wap - Write-Audit-Publish pipeline microservice
//!
//! Entry point: resolves the data root folder, opens or creates the
//! database, starts the background scheduler and serves the trigger/read
//! API.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use beatline_wap::{build_router, scheduler, AppState};

/// Command-line arguments for beatline-wap
#[derive(Parser, Debug)]
#[command(name = "beatline-wap")]
#[command(about = "Write-Audit-Publish event pipeline for Beatline")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5730", env = "BEATLINE_PORT")]
    port: u16,

    /// Root folder for the database
    #[arg(short, long, env = "BEATLINE_ROOT_FOLDER")]
    root_folder: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beatline_wap=debug,beatline_common=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!("Starting beatline-wap on port {}", args.port);
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    // Resolve root folder: CLI > env > config file > OS default
    let root_folder = beatline_common::config::resolve_root_folder(
        args.root_folder.as_deref(),
        "BEATLINE_ROOT_FOLDER",
    );
    let db_path = beatline_common::config::prepare_root_folder(&root_folder)
        .context("Failed to initialize root folder")?;
    info!("Database: {}", db_path.display());

    let db = beatline_common::db::init_database(&db_path)
        .await
        .context("Failed to initialize database")?;
    info!("Database connection established");

    let state = AppState::new(db);

    // Recurring jobs: auto-publish, daily rebuild, daily purge
    scheduler::spawn_scheduler(&state).await;

    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("Listening on http://{addr}");
    info!("Health check: http://{addr}/health");

    axum::serve(listener, app).await?;

    Ok(())
}
