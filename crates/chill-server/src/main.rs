//! Binary entrypoint for the chill HTTP server.
//!
//! Configuration comes from `CHILL_*` environment variables (see
//! [`Config::from_env`]); the flags below override them.

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use chill_server::{build_router, AppState, Config};
use chill_storage::{ContentStore, OpenOptions};

/// Serve a chill site over HTTP.
#[derive(Parser, Debug)]
#[command(name = "chill-server", about = "Serve a chill site over HTTP", long_about = None)]
struct Args {
    /// Address to listen on.
    #[arg(long)]
    bind: Option<String>,

    /// SQLite database file.
    #[arg(long)]
    database: Option<PathBuf>,

    /// Theme folder containing the template and SQL folders.
    #[arg(long)]
    theme: Option<PathBuf>,

    /// Never write to the database.
    #[arg(long)]
    read_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::from_env()?;
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(database) = args.database {
        config.database_path = database.to_string_lossy().into_owned();
    }
    if let Some(theme) = args.theme {
        config.theme_path = theme;
    }
    config.read_only |= args.read_only;

    // Opening applies the journal-mode check, so a misconfigured database
    // fails here rather than on the first request.
    let options = OpenOptions {
        read_only: config.read_only,
        testing: config.testing,
    };
    let mut store = ContentStore::open(&config.database_path, options)?;
    if !config.read_only {
        store.init()?;
    }
    tracing::info!(
        schema_version = ?store.schema_version()?,
        "database ready"
    );
    drop(store);

    let app = build_router(AppState::new(&config));

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "starting chill server");

    axum::serve(listener, app).await?;

    Ok(())
}
