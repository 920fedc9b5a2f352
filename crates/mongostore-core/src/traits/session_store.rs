//! Session store trait for pluggable persistence backends.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::filter::SessionFilter;
use crate::types::session::SessionData;

/// Trait for session persistence backends (MongoDB, in-memory).
///
/// Every operation is a single independent request against the backing
/// store. Implementations do not retry and do not recover locally: backing
/// store failures are returned to the caller as-is.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug + 'static {
    /// Get a live session by id.
    ///
    /// Returns `None` when no session exists. A session whose cookie has
    /// expired is destroyed instead of returned; the outcome of that destroy
    /// becomes the outcome of this call.
    async fn get(&self, sid: &str) -> AppResult<Option<SessionData>>;

    /// Create or fully replace the session stored under `sid`.
    ///
    /// The payload must carry a cookie. A cookie without `expires` is given
    /// the store's default lifetime.
    async fn set(&self, sid: &str, session: SessionData) -> AppResult<()>;

    /// Remove the session stored under `sid`. Removing a missing session is
    /// not an error.
    async fn destroy(&self, sid: &str) -> AppResult<()>;

    /// Count stored sessions matching `filter`, or all sessions when `None`.
    async fn count(&self, filter: Option<&SessionFilter>) -> AppResult<u64>;

    /// Remove every session.
    async fn clear(&self) -> AppResult<()>;

    /// Check that the backing store is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
