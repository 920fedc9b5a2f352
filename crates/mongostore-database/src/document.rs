//! Conversion between [`SessionData`] and stored BSON documents.
//!
//! Stored layout: the session fields at top level, the injected `sid`, and a
//! `cookie` sub-document whose `expires` is a BSON `DateTime`.

use chrono::{DateTime, Utc};
use mongodb::bson::{self, Bson, Document};

use mongostore_core::error::{AppError, ErrorKind};
use mongostore_core::result::AppResult;
use mongostore_core::types::SessionData;
use mongostore_core::types::session::millis_from_f64;

/// Build the document stored for `sid`.
///
/// Expects a payload already passed through
/// [`SessionData::prepare_for_store`].
pub fn to_document(sid: &str, session: &SessionData) -> AppResult<Document> {
    let value = session.to_json()?;
    let mut document = bson::to_document(&value).map_err(|e| {
        AppError::with_source(
            ErrorKind::Serialization,
            format!("Failed to encode session '{sid}': {e}"),
            e,
        )
    })?;

    if let Some(expires) = session.expires() {
        let cookie = document.get_document_mut("cookie").map_err(|e| {
            AppError::with_source(
                ErrorKind::Serialization,
                format!("Encoded session '{sid}' has no cookie document"),
                e,
            )
        })?;
        cookie.insert(
            "expires",
            Bson::DateTime(bson::DateTime::from_millis(expires.timestamp_millis())),
        );
    }

    document.insert("sid", sid);
    Ok(document)
}

/// Decode a stored document into its plain data representation.
///
/// `_id` and `sid` are dropped if the query did not already project them
/// out.
pub fn from_document(mut document: Document) -> AppResult<SessionData> {
    document.remove("_id");
    document.remove("sid");

    let expires = match document.get_document_mut("cookie") {
        Ok(cookie) => match cookie.remove("expires") {
            Some(raw) => decode_expires(raw)?,
            None => None,
        },
        Err(_) => None,
    };

    let value = Bson::Document(document).into_relaxed_extjson();
    let mut session: SessionData = serde_json::from_value(value)?;
    if let Some(cookie) = session.cookie.as_mut() {
        cookie.expires = expires;
    }
    Ok(session)
}

/// Read a stored expiry.
///
/// Older writers stored epoch milliseconds or text; all of them decode to
/// the same instant type.
fn decode_expires(raw: Bson) -> AppResult<Option<DateTime<Utc>>> {
    let millis = match raw {
        Bson::DateTime(dt) => dt.timestamp_millis(),
        Bson::Int64(ms) => ms,
        Bson::Int32(ms) => i64::from(ms),
        Bson::Double(ms) => millis_from_f64(ms).ok_or_else(|| {
            AppError::serialization(format!(
                "Stored cookie expiry is not whole milliseconds: {ms}"
            ))
        })?,
        Bson::String(text) => {
            return DateTime::parse_from_rfc3339(&text)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|e| {
                    AppError::with_source(
                        ErrorKind::Serialization,
                        format!("Stored cookie expiry '{text}' is not a timestamp"),
                        e,
                    )
                });
        }
        Bson::Null | Bson::Undefined => return Ok(None),
        other => {
            return Err(AppError::serialization(format!(
                "Stored cookie expiry has unsupported type {:?}",
                other.element_type()
            )));
        }
    };

    DateTime::from_timestamp_millis(millis)
        .map(Some)
        .ok_or_else(|| AppError::serialization(format!("Stored cookie expiry out of range: {millis}")))
}
