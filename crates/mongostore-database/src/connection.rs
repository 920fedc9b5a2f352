//! MongoDB connection management.

use std::collections::BTreeMap;
use std::time::Duration;

use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::{Client, Database};
use tracing::info;

use mongostore_core::config::DatabaseConfig;
use mongostore_core::config::store::Connection;
use mongostore_core::error::{AppError, ErrorKind};
use mongostore_core::result::AppResult;

/// Wrapper around a MongoDB client bound to one database.
///
/// The driver pools connections internally; clones share the same pool.
#[derive(Debug, Clone)]
pub struct MongoConnection {
    /// The underlying driver client.
    client: Client,
    /// The database sessions live in.
    database: Database,
}

impl MongoConnection {
    /// Connect to the host application's default database.
    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        Self::from_uri(
            &config.url,
            config.name.as_deref(),
            Some(Duration::from_secs(config.connect_timeout_seconds)),
        )
        .await
    }

    /// Connect from a connection string.
    ///
    /// The database is the default database named in the URI, else
    /// `fallback_db`.
    pub async fn from_uri(
        uri: &str,
        fallback_db: Option<&str>,
        connect_timeout: Option<Duration>,
    ) -> AppResult<Self> {
        info!(uri = %mask_password(uri), "Connecting to MongoDB");

        let mut options = ClientOptions::parse(uri).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Configuration,
                format!("Invalid MongoDB connection string: {e}"),
                e,
            )
        })?;
        if connect_timeout.is_some() {
            options.connect_timeout = connect_timeout;
        }

        let db_name = options
            .default_database
            .clone()
            .or_else(|| fallback_db.map(str::to_string))
            .ok_or_else(|| {
                AppError::configuration(format!(
                    "No database name in '{}' and none configured",
                    mask_password(uri)
                ))
            })?;

        let client = Client::with_options(options).map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to create MongoDB client", e)
        })?;
        let database = client.database(&db_name);

        info!(database = %db_name, "MongoDB client ready");
        Ok(Self { client, database })
    }

    /// Connect from discrete host, database, port and driver options.
    pub async fn from_parts(
        host: &str,
        db: &str,
        port: u16,
        options: &BTreeMap<String, String>,
    ) -> AppResult<Self> {
        Self::from_uri(&parts_uri(host, db, port, options), Some(db), None).await
    }

    /// Return a reference to the bound database.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Return a reference to the driver client.
    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> AppResult<bool> {
        ping(&self.database).await
    }
}

/// Resolve the database a session store should use.
///
/// Dedicated connections are opened here; the ambient variant borrows the
/// host application's database and fails if there is none.
pub async fn open_database(
    connection: &Connection,
    ambient: Option<&Database>,
) -> AppResult<Database> {
    match connection {
        Connection::FromUri(uri) => Ok(MongoConnection::from_uri(uri, None, None)
            .await?
            .database),
        Connection::FromParts {
            host,
            db,
            port,
            options,
        } => Ok(MongoConnection::from_parts(host, db, *port, options)
            .await?
            .database),
        Connection::Ambient => {
            let database = ambient.ok_or_else(|| {
                AppError::configuration(
                    "Session store has no dedicated connection and no default database was supplied",
                )
            })?;
            info!(database = %database.name(), "Using ambient MongoDB database");
            Ok(database.clone())
        }
    }
}

/// Send a `ping` command to the database.
pub async fn ping(database: &Database) -> AppResult<bool> {
    database
        .run_command(doc! { "ping": 1 })
        .await
        .map(|reply| reply.get_f64("ok").map(|ok| ok == 1.0).unwrap_or(true))
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Health check failed", e))
}

/// Build a connection string from discrete parts.
///
/// Option keys and values are percent-encoded.
fn parts_uri(host: &str, db: &str, port: u16, options: &BTreeMap<String, String>) -> String {
    let mut uri = format!("mongodb://{host}:{port}/{db}");
    if !options.is_empty() {
        let query: Vec<String> = options
            .iter()
            .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
            .collect();
        uri.push('?');
        uri.push_str(&query.join("&"));
    }
    uri
}

/// Mask the password portion of a connection string for safe logging.
fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let scheme_end = url.find("://").map(|p| p + 3).unwrap_or(0);
            if colon_pos > scheme_end {
                return format!("{}:****@{}", &url[..colon_pos], &url[at_pos + 1..]);
            }
        }
    }
    url.to_string()
}
