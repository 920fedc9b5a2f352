//! CLI command definitions and dispatch.

pub mod session;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use mongostore_core::config::AppConfig;
use mongostore_core::error::AppError;
use mongostore_database::MongoConnection;
use mongostore_store::SessionStoreManager;

/// MongoStore — web session persistence on MongoDB
#[derive(Debug, Parser)]
#[command(name = "mongostore", version, about, long_about = None)]
pub struct Cli {
    /// Path to the base configuration file
    #[arg(short, long, default_value = "config/default")]
    pub config: String,

    /// Environment overlay to merge (loads `config/<ENV>`)
    #[arg(short, long)]
    pub env: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show a live session
    Get {
        /// Session ID
        sid: String,
    },
    /// Create or replace a session
    Set {
        /// Session ID
        sid: String,
        /// Session payload as a JSON object
        #[arg(long, default_value = r#"{"cookie":{}}"#)]
        data: String,
    },
    /// Remove a session
    Destroy {
        /// Session ID
        sid: String,
    },
    /// Count sessions
    Count {
        /// Equality filter as a JSON object, e.g. '{"user.role":"admin"}'
        #[arg(long)]
        filter: Option<String>,
    },
    /// Remove every session
    Clear {
        /// Skip confirmation
        #[arg(long)]
        force: bool,
    },
    /// Check that the session backend is reachable
    Health,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: &AppConfig) -> Result<(), AppError> {
        tracing::debug!(command = ?self.command, backend = %config.store.backend, "Executing command");
        let store = open_store(config).await?;

        match &self.command {
            Commands::Get { sid } => session::get(&store, sid, self.format).await,
            Commands::Set { sid, data } => session::set(&store, sid, data).await,
            Commands::Destroy { sid } => session::destroy(&store, sid).await,
            Commands::Count { filter } => {
                session::count(&store, filter.as_deref(), self.format).await
            }
            Commands::Clear { force } => session::clear(&store, *force).await,
            Commands::Health => session::health(&store).await,
        }
    }
}

/// Helper: build the configured session store
///
/// The `[database]` section, when present, is the ambient connection used
/// by a MongoDB store that has no dedicated one.
pub async fn open_store(config: &AppConfig) -> Result<SessionStoreManager, AppError> {
    match &config.database {
        Some(database) if config.store.backend == "mongodb" => {
            let ambient = MongoConnection::connect(database).await?;
            SessionStoreManager::with_ambient(&config.store, ambient.database()).await
        }
        _ => SessionStoreManager::new(&config.store).await,
    }
}
