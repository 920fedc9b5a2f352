//! Session store configuration.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Session store configuration.
///
/// The connection options (`uri`, `host`, `db`, `port`, `options`) are kept
/// flat so they read the same way in TOML and environment variables; they
/// are resolved into a [`Connection`] with [`SessionStoreConfig::connection`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStoreConfig {
    /// Store backend: `"mongodb"` or `"memory"`.
    #[serde(default = "default_backend")]
    pub backend: String,
    /// Name of the session collection.
    #[serde(default = "default_collection")]
    pub collection: String,
    /// Lifetime given to sessions whose cookie carries no expiry, in milliseconds.
    #[serde(default = "default_max_age_ms")]
    pub default_max_age_ms: u64,
    /// Connection string for a dedicated connection.
    #[serde(default)]
    pub uri: Option<String>,
    /// Host for a dedicated connection built from parts.
    #[serde(default)]
    pub host: Option<String>,
    /// Database name for a dedicated connection built from parts.
    #[serde(default)]
    pub db: Option<String>,
    /// Port for a dedicated connection built from parts.
    #[serde(default)]
    pub port: Option<u16>,
    /// Extra driver options (connection-string options such as `replicaSet`).
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

impl Default for SessionStoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            collection: default_collection(),
            default_max_age_ms: default_max_age_ms(),
            uri: None,
            host: None,
            db: None,
            port: None,
            options: BTreeMap::new(),
        }
    }
}

/// Where the store gets its database connection from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Connection {
    /// No dedicated connection; use the host application's default database.
    Ambient,
    /// Dedicated connection from a connection string.
    FromUri(String),
    /// Dedicated connection from discrete parts plus driver options.
    FromParts {
        /// Server host.
        host: String,
        /// Database name.
        db: String,
        /// Server port.
        port: u16,
        /// Extra driver options.
        options: BTreeMap<String, String>,
    },
}

impl SessionStoreConfig {
    /// Resolve the connection options.
    ///
    /// `uri` wins over the discrete parts; the parts are only used when
    /// `host`, `db` and `port` are all present. Anything else is ambient.
    pub fn connection(&self) -> Connection {
        if let Some(uri) = self.uri.as_ref().filter(|u| !u.is_empty()) {
            return Connection::FromUri(uri.clone());
        }

        match (&self.host, &self.db, self.port) {
            (Some(host), Some(db), Some(port)) if !host.is_empty() && !db.is_empty() => {
                Connection::FromParts {
                    host: host.clone(),
                    db: db.clone(),
                    port,
                    options: self.options.clone(),
                }
            }
            _ => Connection::Ambient,
        }
    }

    /// Default session lifetime as a chrono duration.
    pub fn default_max_age(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(i64::try_from(self.default_max_age_ms).unwrap_or(i64::MAX))
    }
}

fn default_backend() -> String {
    "mongodb".to_string()
}

fn default_collection() -> String {
    "sessions".to_string()
}

fn default_max_age_ms() -> u64 {
    3_600_000
}
