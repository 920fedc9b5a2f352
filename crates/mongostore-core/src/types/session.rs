//! Session payload as seen by the store.
//!
//! A session is an opaque bag of fields plus a `cookie` sub-document whose
//! `expires` attribute drives lazy eviction. `expires` has a single
//! representation everywhere: a UTC instant truncated to milliseconds.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::result::AppResult;

/// Lifetime given to a session whose cookie has no expiry, in milliseconds.
pub const DEFAULT_MAX_AGE_MS: i64 = 3_600_000;

/// Field names owned by the store and never kept in a session payload.
pub const RESERVED_FIELDS: [&str; 2] = ["_id", "sid"];

/// Plain data representation of a stored session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionData {
    /// Cookie settings of the session. Required on write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie: Option<SessionCookie>,
    /// Every other session field, opaque to the store.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Cookie sub-document of a session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionCookie {
    /// Absolute expiry. `None` is a browser-session cookie with no fixed expiry.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_expires",
        deserialize_with = "deserialize_expires"
    )]
    pub expires: Option<DateTime<Utc>>,
    /// Remaining cookie attributes (`path`, `httpOnly`, `originalMaxAge`, ...).
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl SessionCookie {
    /// Cookie with a fixed expiry.
    pub fn expiring_at(expires: DateTime<Utc>) -> Self {
        Self {
            expires: Some(expires),
            attributes: Map::new(),
        }
    }
}

impl SessionData {
    /// Session with the given cookie and no other fields.
    pub fn new(cookie: SessionCookie) -> Self {
        Self {
            cookie: Some(cookie),
            fields: Map::new(),
        }
    }

    /// Builder-style field insertion.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Parse a session from its JSON representation.
    pub fn from_json(value: Value) -> AppResult<Self> {
        if !value.is_object() {
            return Err(AppError::invalid_session("expected a JSON object"));
        }
        serde_json::from_value(value).map_err(AppError::invalid_session)
    }

    /// JSON representation of this session.
    pub fn to_json(&self) -> AppResult<Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// Expiry of the session cookie, if any.
    pub fn expires(&self) -> Option<DateTime<Utc>> {
        self.cookie.as_ref().and_then(|c| c.expires)
    }

    /// Whether the session may still be handed out at `now`.
    ///
    /// A session with no expiry is live; otherwise the expiry must be
    /// strictly later than `now`.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires() {
            Some(expires) => expires > now,
            None => true,
        }
    }

    /// Normalize a payload before it is written.
    ///
    /// Rejects payloads without a cookie, drops store-owned fields, and
    /// gives the cookie an expiry: the existing one truncated to
    /// milliseconds, or `now + default_max_age`.
    pub fn prepare_for_store(
        mut self,
        now: DateTime<Utc>,
        default_max_age: Duration,
    ) -> AppResult<Self> {
        let Some(cookie) = self.cookie.as_mut() else {
            return Err(AppError::invalid_session("missing cookie"));
        };

        let expires = match cookie.expires {
            Some(expires) => expires,
            None => now
                .checked_add_signed(default_max_age)
                .ok_or_else(|| AppError::invalid_session("cookie expiry out of range"))?,
        };
        cookie.expires = Some(truncate_to_millis(expires)?);

        for field in RESERVED_FIELDS {
            self.fields.remove(field);
        }

        Ok(self)
    }
}

/// Reject empty session ids.
pub fn validate_sid(sid: &str) -> AppResult<()> {
    if sid.is_empty() {
        return Err(AppError::validation("session id must not be empty"));
    }
    Ok(())
}

/// Convert a floating-point epoch-milliseconds value to an integer.
///
/// Returns `None` for non-finite, fractional or out-of-range values.
pub fn millis_from_f64(ms: f64) -> Option<i64> {
    if !ms.is_finite() || ms.fract() != 0.0 {
        return None;
    }
    // i64::MAX as f64 rounds up to 2^63, hence the strict upper bound.
    (ms >= i64::MIN as f64 && ms < i64::MAX as f64).then_some(ms as i64)
}

/// Truncate an instant to millisecond precision.
pub fn truncate_to_millis(instant: DateTime<Utc>) -> AppResult<DateTime<Utc>> {
    DateTime::from_timestamp_millis(instant.timestamp_millis())
        .ok_or_else(|| AppError::invalid_session("cookie expiry out of range"))
}

fn serialize_expires<S>(value: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(expires) => {
            serializer.serialize_str(&expires.to_rfc3339_opts(SecondsFormat::Millis, true))
        }
        None => serializer.serialize_none(),
    }
}

/// Accepts RFC 3339 text or epoch milliseconds.
fn deserialize_expires<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Expires {
        Millis(i64),
        Fractional(f64),
        Text(String),
    }

    let millis = match Option::<Expires>::deserialize(deserializer)? {
        None => return Ok(None),
        Some(Expires::Millis(ms)) => ms,
        Some(Expires::Fractional(ms)) => millis_from_f64(ms).ok_or_else(|| {
            D::Error::custom(format!("cookie expiry is not whole milliseconds: {ms}"))
        })?,
        Some(Expires::Text(text)) => {
            return DateTime::parse_from_rfc3339(&text)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|e| D::Error::custom(format!("invalid cookie expiry '{text}': {e}")));
        }
    };

    DateTime::from_timestamp_millis(millis)
        .map(Some)
        .ok_or_else(|| D::Error::custom(format!("cookie expiry out of range: {millis}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).unwrap()
    }

    #[test]
    fn test_parse_expires_from_text_and_millis() {
        let text = SessionData::from_json(json!({
            "cookie": {"expires": "2030-01-01T00:00:00.000Z", "path": "/"},
            "user": "alice"
        }))
        .unwrap();
        let millis = SessionData::from_json(json!({
            "cookie": {"expires": 1_893_456_000_000_i64}
        }))
        .unwrap();

        assert_eq!(text.expires(), Some(at(1_893_456_000_000)));
        assert_eq!(millis.expires(), text.expires());
        assert_eq!(text.fields["user"], "alice");
        assert_eq!(text.cookie.unwrap().attributes["path"], "/");
    }

    #[test]
    fn test_null_expires_is_session_cookie() {
        let data = SessionData::from_json(json!({"cookie": {"expires": null}})).unwrap();
        assert_eq!(data.cookie, Some(SessionCookie::default()));
        assert!(data.is_live_at(Utc::now()));
    }

    #[test]
    fn test_serialized_expires_is_rfc3339_millis() {
        let data = SessionData::new(SessionCookie::expiring_at(at(1_893_456_000_123)));
        let value = data.to_json().unwrap();
        assert_eq!(value, json!({"cookie": {"expires": "2030-01-01T00:00:00.123Z"}}));
    }

    #[test]
    fn test_rejects_non_object() {
        let err = SessionData::from_json(json!(["cookie"])).unwrap_err();
        assert!(err.is(crate::error::ErrorKind::Validation));
    }

    #[test]
    fn test_malformed_payload_is_validation_error() {
        for payload in [
            json!({"cookie": {"expires": "garbage"}}),
            json!({"cookie": "abc"}),
            json!({"cookie": {"expires": 1.5}}),
            json!({"cookie": {"expires": 1e300}}),
        ] {
            let err = SessionData::from_json(payload.clone()).unwrap_err();
            assert!(err.is(crate::error::ErrorKind::Validation), "{payload}");
            assert!(err.message.contains("invalid session payload"), "{payload}");
        }
    }

    #[test]
    fn test_whole_float_millis_accepted() {
        let data = SessionData::from_json(json!({"cookie": {"expires": 1_893_456_000_000.0}}))
            .unwrap();
        assert_eq!(data.expires(), Some(at(1_893_456_000_000)));
    }

    #[test]
    fn test_millis_from_f64() {
        assert_eq!(millis_from_f64(42.0), Some(42));
        assert_eq!(millis_from_f64(-1.0), Some(-1));
        assert_eq!(millis_from_f64(0.5), None);
        assert_eq!(millis_from_f64(f64::NAN), None);
        assert_eq!(millis_from_f64(f64::INFINITY), None);
        assert_eq!(millis_from_f64(1e19), None);
    }

    #[test]
    fn test_liveness_is_strict() {
        let now = at(10_000);
        let data = SessionData::new(SessionCookie::expiring_at(now));
        assert!(!data.is_live_at(now));
        assert!(data.is_live_at(at(9_999)));
        assert!(SessionData::default().is_live_at(now));
    }

    #[test]
    fn test_prepare_assigns_default_expiry() {
        let now = at(1_000_000);
        let prepared = SessionData::new(SessionCookie::default())
            .prepare_for_store(now, Duration::milliseconds(DEFAULT_MAX_AGE_MS))
            .unwrap();
        assert_eq!(prepared.expires(), Some(at(1_000_000 + DEFAULT_MAX_AGE_MS)));
    }

    #[test]
    fn test_prepare_keeps_existing_expiry_at_millis() {
        let expires = at(5_000_123) + Duration::nanoseconds(456_789);
        let prepared = SessionData::new(SessionCookie::expiring_at(expires))
            .prepare_for_store(at(0), Duration::hours(1))
            .unwrap();
        assert_eq!(prepared.expires(), Some(at(5_000_123)));
    }

    #[test]
    fn test_prepare_requires_cookie() {
        let err = SessionData::default()
            .with_field("user", "alice")
            .prepare_for_store(Utc::now(), Duration::hours(1))
            .unwrap_err();
        assert!(err.is(crate::error::ErrorKind::Validation));
        assert!(err.message.contains("missing cookie"));
    }

    #[test]
    fn test_prepare_drops_reserved_fields() {
        let prepared = SessionData::new(SessionCookie::default())
            .with_field("sid", "spoofed")
            .with_field("_id", "x")
            .with_field("user", "alice")
            .prepare_for_store(Utc::now(), Duration::hours(1))
            .unwrap();
        assert_eq!(prepared.fields.len(), 1);
        assert_eq!(prepared.fields["user"], "alice");
    }

    #[test]
    fn test_validate_sid() {
        assert!(validate_sid("abc123").is_ok());
        assert!(validate_sid("").is_err());
    }
}
