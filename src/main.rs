mod logging;

use std::{env, sync::Arc};

use colored::Colorize;
use log::{error, info, warn};
use thiserror::Error;
use tocatocar_collab::{
    Collab, CollabConfig, DatabaseError, MemoryDatabase, PgDatabase, SharedDatabase,
};
use tocatocar_server::{run_server, ServeError, ServerConfig};

/// Everything needed to start Toca Tocar, read from the environment
#[derive(Debug, Default)]
struct Config {
    /// Postgres connection string. Without it, data only lives in memory.
    database_url: Option<String>,
    verbose: bool,
    server: ServerConfig,
    collab: CollabConfig,
}

impl Config {
    fn from_env() -> Result<Self, TocaError> {
        Ok(Self {
            database_url: env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
            verbose: env::var("TOCATOCAR_LOG").is_ok_and(|level| level.eq_ignore_ascii_case("debug")),
            server: ServerConfig::from_env().map_err(TocaError::Config)?,
            collab: CollabConfig::from_env().map_err(TocaError::Config)?,
        })
    }
}

#[derive(Debug, Error)]
enum TocaError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Could not initialize database: {0}")]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Serve(#[from] ServeError),
}

impl TocaError {
    fn hint(&self) -> Option<&'static str> {
        match self {
            Self::Config(_) => Some("Check the TOCATOCAR_* environment variables"),
            Self::Database(_) => {
                Some("Make sure postgres is running and DATABASE_URL points to it")
            }
            Self::Serve(_) => Some("Is another process using the port? Set TOCATOCAR_SERVER_PORT"),
        }
    }
}

async fn connect(config: &Config) -> Result<SharedDatabase, TocaError> {
    match &config.database_url {
        Some(url) => {
            info!("Connecting to database...");
            Ok(Arc::new(PgDatabase::new(url).await?))
        }
        None => {
            warn!("DATABASE_URL is not set, data will be lost on exit");
            Ok(Arc::new(MemoryDatabase::new()))
        }
    }
}

async fn run() -> Result<(), TocaError> {
    let config = Config::from_env()?;

    if logging::init_logger(config.verbose).is_err() {
        eprintln!("A logger was already installed");
    }

    info!("Starting {}...", "Toca Tocar".bold());

    let database = connect(&config).await?;
    let collab = Arc::new(Collab::new(database, &config.collab));

    run_server(collab, config.server).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("{}", e);
        eprintln!("{}", e.to_string().red());

        if let Some(hint) = e.hint() {
            eprintln!("{} {}", "hint:".bright_black(), hint);
        }

        std::process::exit(1);
    }
}
