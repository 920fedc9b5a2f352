//! In-memory session store implementation using the dashmap crate.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::debug;

use mongostore_core::config::store::SessionStoreConfig;
use mongostore_core::result::AppResult;
use mongostore_core::traits::SessionStore;
use mongostore_core::types::session::validate_sid;
use mongostore_core::types::{SessionData, SessionFilter};

/// In-memory session store.
///
/// Applies the same write normalization and lazy eviction as the MongoDB
/// store. Clones share the same map.
#[derive(Debug, Clone)]
pub struct MemorySessionStore {
    /// Sessions keyed by sid.
    sessions: Arc<DashMap<String, SessionData>>,
    /// Lifetime given to sessions whose cookie has no expiry.
    default_max_age: chrono::Duration,
}

impl MemorySessionStore {
    /// Create a new in-memory store from configuration.
    pub fn new(config: &SessionStoreConfig) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            default_max_age: config.default_max_age(),
        }
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Whether nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Whether an entry exists for `sid`, without applying eviction.
    pub fn contains(&self, sid: &str) -> bool {
        self.sessions.contains_key(sid)
    }

    /// Remove the entry for `sid` only if it is expired at `now`.
    ///
    /// A session rewritten after the expired read stays in place.
    fn evict_expired(&self, sid: &str, now: DateTime<Utc>) -> bool {
        self.sessions
            .remove_if(sid, |_, session| !session.is_live_at(now))
            .is_some()
    }
}

impl Default for MemorySessionStore {
    fn default() -> Self {
        Self::new(&SessionStoreConfig::default())
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, sid: &str) -> AppResult<Option<SessionData>> {
        validate_sid(sid)?;

        // Clone out so no shard lock is held across the eviction below.
        let Some(session) = self.sessions.get(sid).map(|entry| entry.value().clone()) else {
            debug!(sid, "Session not found");
            return Ok(None);
        };

        let now = Utc::now();
        if session.is_live_at(now) {
            return Ok(Some(session));
        }

        let evicted = self.evict_expired(sid, now);
        debug!(sid, expires = ?session.expires(), evicted, "Session expired");
        Ok(None)
    }

    async fn set(&self, sid: &str, session: SessionData) -> AppResult<()> {
        validate_sid(sid)?;

        let session = session.prepare_for_store(Utc::now(), self.default_max_age)?;
        let replaced = self.sessions.insert(sid.to_string(), session).is_some();

        debug!(sid, replaced, "Session stored");
        Ok(())
    }

    async fn destroy(&self, sid: &str) -> AppResult<()> {
        validate_sid(sid)?;

        let removed = self.sessions.remove(sid).is_some();
        debug!(sid, removed, "Session destroyed");
        Ok(())
    }

    async fn count(&self, filter: Option<&SessionFilter>) -> AppResult<u64> {
        let Some(filter) = filter.filter(|f| !f.is_empty()) else {
            return Ok(self.sessions.len() as u64);
        };

        let mut count = 0u64;
        for entry in self.sessions.iter() {
            let mut document = entry.value().to_json()?;
            if let Some(object) = document.as_object_mut() {
                object.insert("sid".to_string(), entry.key().clone().into());
            }
            if filter.matches(&document) {
                count += 1;
            }
        }
        Ok(count)
    }

    async fn clear(&self) -> AppResult<()> {
        let count = self.sessions.len();
        self.sessions.clear();
        debug!(count, "Cleared in-memory sessions");
        Ok(())
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use mongostore_core::error::ErrorKind;
    use mongostore_core::types::SessionCookie;
    use serde_json::json;

    fn make_store() -> MemorySessionStore {
        MemorySessionStore::new(&SessionStoreConfig::default())
    }

    #[tokio::test]
    async fn test_get_missing() {
        let store = make_store();
        assert!(store.get("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_get() {
        let store = make_store();
        let session = SessionData::new(SessionCookie::expiring_at(
            Utc::now() + Duration::days(1),
        ))
        .with_field("user", "alice");

        store.set("s1", session.clone()).await.unwrap();
        let stored = store.get("s1").await.unwrap().unwrap();

        assert_eq!(stored.fields, session.fields);
        assert_eq!(
            stored.expires().unwrap().timestamp_millis(),
            session.expires().unwrap().timestamp_millis()
        );
    }

    #[tokio::test]
    async fn test_default_expiry_follows_config() {
        let config = SessionStoreConfig {
            default_max_age_ms: 1_000,
            ..Default::default()
        };
        let store = MemorySessionStore::new(&config);

        let before = Utc::now();
        store
            .set("short", SessionData::new(SessionCookie::default()))
            .await
            .unwrap();
        let expires = store.get("short").await.unwrap().unwrap().expires().unwrap();

        assert!(expires > before);
        assert!(expires <= Utc::now() + Duration::seconds(1));
    }

    #[tokio::test]
    async fn test_expired_session_is_evicted() {
        let store = make_store();
        let expired =
            SessionData::new(SessionCookie::expiring_at(Utc::now() - Duration::seconds(1)));
        store.set("old", expired).await.unwrap();
        assert!(store.contains("old"));

        assert!(store.get("old").await.unwrap().is_none());
        assert!(!store.contains("old"));
    }

    #[tokio::test]
    async fn test_eviction_spares_rewritten_session() {
        let store = make_store();
        let now = Utc::now();
        store
            .set("s1", SessionData::new(SessionCookie::expiring_at(now - Duration::seconds(1))))
            .await
            .unwrap();

        // Another writer refreshes the session before the expired read evicts it.
        store
            .set("s1", SessionData::new(SessionCookie::expiring_at(now + Duration::hours(1))))
            .await
            .unwrap();
        assert!(!store.evict_expired("s1", now));
        assert!(store.get("s1").await.unwrap().is_some());

        store
            .set("s1", SessionData::new(SessionCookie::expiring_at(now - Duration::seconds(1))))
            .await
            .unwrap();
        assert!(store.evict_expired("s1", now));
        assert!(!store.contains("s1"));
    }

    #[tokio::test]
    async fn test_set_replaces_instead_of_merging() {
        let store = make_store();
        let first = SessionData::new(SessionCookie::default())
            .with_field("user", "alice")
            .with_field("cart", json!([1]));
        store.set("s1", first).await.unwrap();
        store
            .set("s1", SessionData::new(SessionCookie::default()).with_field("user", "bob"))
            .await
            .unwrap();

        let stored = store.get("s1").await.unwrap().unwrap();
        assert_eq!(stored.fields.len(), 1);
        assert_eq!(stored.fields["user"], "bob");
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_payload() {
        let store = make_store();
        let err = store.set("s1", SessionData::default()).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_count_with_filter() {
        let store = make_store();
        for (sid, role) in [("a", "admin"), ("b", "viewer"), ("c", "viewer")] {
            let session = SessionData::new(SessionCookie::default()).with_field("role", role);
            store.set(sid, session).await.unwrap();
        }

        assert_eq!(store.count(None).await.unwrap(), 3);
        assert_eq!(store.count(Some(&SessionFilter::all())).await.unwrap(), 3);
        assert_eq!(
            store
                .count(Some(&SessionFilter::all().eq("role", "viewer")))
                .await
                .unwrap(),
            2
        );
        assert_eq!(store.count(Some(&SessionFilter::by_sid("a"))).await.unwrap(), 1);
        assert_eq!(store.count(Some(&SessionFilter::by_sid("z"))).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_destroy_is_idempotent() {
        let store = make_store();
        store
            .set("s1", SessionData::new(SessionCookie::default()))
            .await
            .unwrap();
        store.destroy("s1").await.unwrap();
        store.destroy("s1").await.unwrap();
        assert!(store.get("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let store = make_store();
        store
            .set("s1", SessionData::new(SessionCookie::default()))
            .await
            .unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.count(None).await.unwrap(), 0);
        assert!(store.get("s1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_health_check() {
        assert!(make_store().health_check().await.unwrap());
    }
}
