use anyhow::Context;
use catalog_loader::config::{Config, StorageBackend};
use catalog_loader::observer::TracingObserver;
use catalog_loader::storage::{InMemoryStorage, SqliteStorage, Storage};
use catalog_loader::{logging, metrics, reader, Loader};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "catalog_loader")]
#[command(about = "Normalize a flat multimedia catalog into a relational schema")]
#[command(version = "0.1.0")]
struct Cli {
    /// Config file (defaults to catalog_loader.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load a catalog file into the store and print the run report as JSON
    Load {
        /// Catalog CSV to read
        #[arg(long)]
        input: Option<PathBuf>,
        /// SQLite database file
        #[arg(long)]
        database: Option<PathBuf>,
        /// Use a throwaway in-memory store
        #[arg(long, conflicts_with = "database")]
        in_memory: bool,
        /// Skip the content/release-date association pass
        #[arg(long)]
        skip_release_links: bool,
        /// Also link records whose content row already exists
        #[arg(long)]
        relink_existing: bool,
    },
    /// Create the schema and sentinel rows
    InitDb {
        /// SQLite database file
        #[arg(long)]
        database: Option<PathBuf>,
    },
}

async fn open_storage(config: &Config) -> anyhow::Result<Box<dyn Storage>> {
    match config.storage.backend {
        StorageBackend::Memory => Ok(Box::new(InMemoryStorage::new())),
        StorageBackend::Sqlite => {
            let storage = SqliteStorage::open(&config.storage.sqlite_path).with_context(|| {
                format!(
                    "opening SQLite database {}",
                    config.storage.sqlite_path.display()
                )
            })?;
            Ok(Box::new(storage))
        }
        #[cfg(feature = "db")]
        StorageBackend::Libsql => {
            let url = config
                .storage
                .libsql_url
                .as_deref()
                .context("LIBSQL_URL must be set for the libsql backend")?;
            let token = config
                .storage
                .libsql_auth_token
                .as_deref()
                .context("LIBSQL_AUTH_TOKEN must be set for the libsql backend")?;
            let storage = catalog_loader::storage::LibsqlStorage::connect_remote(url, token).await?;
            Ok(Box::new(storage))
        }
        #[cfg(not(feature = "db"))]
        StorageBackend::Libsql => {
            anyhow::bail!("the libsql backend requires building with --features db")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();

    let cli = Cli::parse();
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(addr) = config.metrics.listen_addr {
        metrics::init_metrics(addr);
    }

    match cli.command {
        Commands::Load {
            input,
            database,
            in_memory,
            skip_release_links,
            relink_existing,
        } => {
            if let Some(input) = input {
                config.input.path = input;
            }
            if let Some(database) = database {
                config.storage.backend = StorageBackend::Sqlite;
                config.storage.sqlite_path = database;
            }
            if in_memory {
                config.storage.backend = StorageBackend::Memory;
            }
            if skip_release_links {
                config.loader.link_release_dates = false;
            }
            if relink_existing {
                config.loader.relink_existing = true;
            }

            let batch = reader::read_catalog(&config.input.path)?;
            let storage = open_storage(&config).await?;
            let observer = TracingObserver;
            let mut loader = Loader::new(storage.as_ref(), &observer, config.loader.clone());

            match loader.load_batch(&batch).await {
                Ok(report) => {
                    println!("{}", report.to_json_pretty()?);
                }
                Err(e) => {
                    error!("Catalog load failed: {}", e);
                    return Err(e.into());
                }
            }
        }
        Commands::InitDb { database } => {
            if let Some(database) = database {
                config.storage.backend = StorageBackend::Sqlite;
                config.storage.sqlite_path = database;
            }
            let storage = open_storage(&config).await?;
            let counts = storage.table_counts().await?;
            info!("Schema ready");
            println!("{}", serde_json::to_string_pretty(&counts)?);
        }
    }
    Ok(())
}
