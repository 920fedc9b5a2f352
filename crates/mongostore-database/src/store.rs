//! MongoDB session store.

use async_trait::async_trait;
use chrono::Utc;
use mongodb::bson::{self, Bson, Document, doc};
use mongodb::options::IndexOptions;
use mongodb::{Collection, Database, IndexModel};
use tracing::{debug, info};

use mongostore_core::config::store::SessionStoreConfig;
use mongostore_core::error::{AppError, ErrorKind};
use mongostore_core::result::AppResult;
use mongostore_core::traits::SessionStore;
use mongostore_core::types::session::validate_sid;
use mongostore_core::types::{SessionData, SessionFilter};

use crate::connection;
use crate::document;

/// Session store backed by one MongoDB collection.
///
/// Holds the database handle for its whole lifetime; clones share the
/// driver's connection pool.
#[derive(Debug, Clone)]
pub struct MongoSessionStore {
    /// Database holding the session collection.
    database: Database,
    /// The session collection.
    collection: Collection<Document>,
    /// Lifetime given to sessions whose cookie has no expiry.
    default_max_age: chrono::Duration,
}

impl MongoSessionStore {
    /// Create a store from configuration.
    ///
    /// Opens the dedicated connection the configuration asks for, or uses
    /// `ambient` (the host application's database) when it asks for none.
    /// The unique `sid` index is in place before this returns.
    pub async fn connect(
        config: &SessionStoreConfig,
        ambient: Option<&Database>,
    ) -> AppResult<Self> {
        let database = connection::open_database(&config.connection(), ambient).await?;
        Self::with_database(database, config).await
    }

    /// Create a store on an already-open database.
    pub async fn with_database(database: Database, config: &SessionStoreConfig) -> AppResult<Self> {
        let store = Self::new_unindexed(database, config);
        store.ensure_indexes().await?;
        info!(
            database = %store.database.name(),
            collection = %store.collection.name(),
            "MongoDB session store ready"
        );
        Ok(store)
    }

    /// Create a store without touching the server.
    pub fn new_unindexed(database: Database, config: &SessionStoreConfig) -> Self {
        let collection = database.collection::<Document>(&config.collection);
        Self {
            database,
            collection,
            default_max_age: config.default_max_age(),
        }
    }

    /// Ensure the unique index on `sid` exists.
    pub async fn ensure_indexes(&self) -> AppResult<()> {
        let index = IndexModel::builder()
            .keys(doc! { "sid": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();
        self.collection
            .create_index(index)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    /// Return a reference to the session collection.
    pub fn collection(&self) -> &Collection<Document> {
        &self.collection
    }

    /// Map a driver error to an AppError.
    fn map_err(e: mongodb::error::Error) -> AppError {
        let kind = match *e.kind {
            mongodb::error::ErrorKind::ServerSelection { .. } => ErrorKind::ServiceUnavailable,
            _ => ErrorKind::Database,
        };
        AppError::with_source(kind, format!("MongoDB error: {e}"), e)
    }
}

#[async_trait]
impl SessionStore for MongoSessionStore {
    async fn get(&self, sid: &str) -> AppResult<Option<SessionData>> {
        validate_sid(sid)?;

        let found = self
            .collection
            .find_one(doc! { "sid": sid })
            .projection(doc! { "_id": 0, "sid": 0 })
            .await
            .map_err(Self::map_err)?;

        let Some(stored) = found else {
            debug!(sid, "Session not found");
            return Ok(None);
        };

        let stored_expires = stored
            .get_document("cookie")
            .ok()
            .and_then(|cookie| cookie.get("expires"))
            .cloned();
        let session = document::from_document(stored)?;
        if session.is_live_at(Utc::now()) {
            return Ok(Some(session));
        }

        let result = self
            .collection
            .delete_many(eviction_filter(sid, stored_expires))
            .await
            .map_err(Self::map_err)?;
        debug!(
            sid,
            expires = ?session.expires(),
            evicted = result.deleted_count,
            "Session expired"
        );
        Ok(None)
    }

    async fn set(&self, sid: &str, session: SessionData) -> AppResult<()> {
        validate_sid(sid)?;

        let session = session.prepare_for_store(Utc::now(), self.default_max_age)?;
        let stored = document::to_document(sid, &session)?;

        let result = self
            .collection
            .replace_one(doc! { "sid": sid }, stored)
            .upsert(true)
            .await
            .map_err(Self::map_err)?;

        debug!(
            sid,
            matched = result.matched_count,
            upserted = result.upserted_id.is_some(),
            "Session stored"
        );
        Ok(())
    }

    async fn destroy(&self, sid: &str) -> AppResult<()> {
        validate_sid(sid)?;

        let result = self
            .collection
            .delete_many(doc! { "sid": sid })
            .await
            .map_err(Self::map_err)?;

        debug!(sid, deleted = result.deleted_count, "Session destroyed");
        Ok(())
    }

    async fn count(&self, filter: Option<&SessionFilter>) -> AppResult<u64> {
        let query = match filter {
            Some(filter) if !filter.is_empty() => bson::to_document(filter).map_err(|e| {
                AppError::with_source(
                    ErrorKind::Validation,
                    format!("Session filter is not a valid query: {e}"),
                    e,
                )
            })?,
            _ => Document::new(),
        };

        self.collection
            .count_documents(query)
            .await
            .map_err(Self::map_err)
    }

    async fn clear(&self) -> AppResult<()> {
        self.collection.drop().await.map_err(Self::map_err)?;
        info!(collection = %self.collection.name(), "Session collection dropped");

        // Dropping the collection removes its indexes too.
        self.ensure_indexes().await
    }

    async fn health_check(&self) -> AppResult<bool> {
        connection::ping(&self.database).await
    }
}

/// Query matching the expired document exactly as it was read.
///
/// A session rewritten with a new expiry no longer matches.
fn eviction_filter(sid: &str, stored_expires: Option<Bson>) -> Document {
    let mut filter = doc! { "sid": sid };
    if let Some(expires) = stored_expires {
        filter.insert("cookie.expires", expires);
    }
    filter
}
