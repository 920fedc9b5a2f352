//! Session store manager that dispatches to the configured backend.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use mongostore_core::config::store::SessionStoreConfig;
use mongostore_core::error::AppError;
use mongostore_core::result::AppResult;
use mongostore_core::traits::SessionStore;
use mongostore_core::types::{SessionData, SessionFilter};

/// Session store manager that wraps the configured backend.
///
/// The backend is selected at construction time based on configuration.
#[derive(Debug, Clone)]
pub struct SessionStoreManager {
    /// The inner session store.
    inner: Arc<dyn SessionStore>,
}

impl SessionStoreManager {
    /// Create a new session store manager from configuration.
    ///
    /// A MongoDB backend created this way needs a dedicated connection in
    /// the configuration; use [`SessionStoreManager::with_ambient`] to hand
    /// it the host application's database instead.
    pub async fn new(config: &SessionStoreConfig) -> AppResult<Self> {
        match config.backend.as_str() {
            #[cfg(feature = "mongodb-backend")]
            "mongodb" => Self::mongodb(config, None).await,
            #[cfg(feature = "memory")]
            "memory" => Ok(Self::memory(config)),
            other => Err(unknown_backend(other)),
        }
    }

    /// Create a session store manager that falls back to `ambient` when the
    /// configuration names no dedicated connection.
    #[cfg(feature = "mongodb-backend")]
    pub async fn with_ambient(
        config: &SessionStoreConfig,
        ambient: &mongodb::Database,
    ) -> AppResult<Self> {
        match config.backend.as_str() {
            "mongodb" => Self::mongodb(config, Some(ambient)).await,
            _ => Self::new(config).await,
        }
    }

    /// Create a session store manager from an existing backend (for testing).
    pub fn from_store(store: Arc<dyn SessionStore>) -> Self {
        Self { inner: store }
    }

    /// Get a reference to the inner backend.
    pub fn store(&self) -> &dyn SessionStore {
        self.inner.as_ref()
    }

    #[cfg(feature = "mongodb-backend")]
    async fn mongodb(
        config: &SessionStoreConfig,
        ambient: Option<&mongodb::Database>,
    ) -> AppResult<Self> {
        info!(collection = %config.collection, "Initializing MongoDB session store");
        let store = mongostore_database::MongoSessionStore::connect(config, ambient).await?;
        Ok(Self {
            inner: Arc::new(store),
        })
    }

    #[cfg(feature = "memory")]
    fn memory(config: &SessionStoreConfig) -> Self {
        info!("Initializing in-memory session store");
        Self {
            inner: Arc::new(crate::memory::MemorySessionStore::new(config)),
        }
    }
}

fn unknown_backend(name: &str) -> AppError {
    AppError::configuration(format!(
        "Unknown session store backend: '{name}'. Supported: mongodb, memory"
    ))
}

#[async_trait]
impl SessionStore for SessionStoreManager {
    async fn get(&self, sid: &str) -> AppResult<Option<SessionData>> {
        self.inner.get(sid).await
    }

    async fn set(&self, sid: &str, session: SessionData) -> AppResult<()> {
        self.inner.set(sid, session).await
    }

    async fn destroy(&self, sid: &str) -> AppResult<()> {
        self.inner.destroy(sid).await
    }

    async fn count(&self, filter: Option<&SessionFilter>) -> AppResult<u64> {
        self.inner.count(filter).await
    }

    async fn clear(&self) -> AppResult<()> {
        self.inner.clear().await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}
