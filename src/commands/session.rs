//! Session management CLI commands.

use mongostore_core::error::AppError;
use mongostore_core::traits::SessionStore;
use mongostore_core::types::{SessionData, SessionFilter};
use mongostore_store::SessionStoreManager;

use crate::output::{self, OutputFormat};

/// Show a live session
pub async fn get(
    store: &SessionStoreManager,
    sid: &str,
    format: OutputFormat,
) -> Result<(), AppError> {
    match store.get(sid).await? {
        Some(session) => output::print_document(&session.to_json()?, format),
        None => match format {
            OutputFormat::Json => println!("null"),
            OutputFormat::Text => output::print_warning(&format!("No session '{}'", sid)),
        },
    }
    Ok(())
}

/// Create or replace a session from a JSON payload
pub async fn set(store: &SessionStoreManager, sid: &str, data: &str) -> Result<(), AppError> {
    let session = parse_session(data)?;
    store.set(sid, session).await?;
    output::print_success(&format!("Session {} stored", sid));
    Ok(())
}

/// Remove a session
pub async fn destroy(store: &SessionStoreManager, sid: &str) -> Result<(), AppError> {
    store.destroy(sid).await?;
    output::print_success(&format!("Session {} destroyed", sid));
    Ok(())
}

/// Count sessions, optionally filtered
pub async fn count(
    store: &SessionStoreManager,
    filter: Option<&str>,
    format: OutputFormat,
) -> Result<(), AppError> {
    let filter = filter.map(parse_filter).transpose()?;
    let count = store.count(filter.as_ref()).await?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "count": count })),
        OutputFormat::Text => println!("Sessions: {}", count),
    }
    Ok(())
}

/// Remove every session after confirmation
pub async fn clear(store: &SessionStoreManager, force: bool) -> Result<(), AppError> {
    if !force {
        let confirm = dialoguer::Confirm::new()
            .with_prompt("Remove ALL sessions? This cannot be undone")
            .default(false)
            .interact()
            .map_err(|e| AppError::internal(format!("Input error: {}", e)))?;

        if !confirm {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store.clear().await?;
    output::print_success("All sessions removed");
    Ok(())
}

/// Ping the session backend
pub async fn health(store: &SessionStoreManager) -> Result<(), AppError> {
    if store.health_check().await? {
        output::print_success("Session store is reachable");
        Ok(())
    } else {
        Err(AppError::service_unavailable("Session store did not answer the ping"))
    }
}

fn parse_session(data: &str) -> Result<SessionData, AppError> {
    let value: serde_json::Value = serde_json::from_str(data)
        .map_err(|e| AppError::invalid_session(format!("not valid JSON: {}", e)))?;
    SessionData::from_json(value)
}

fn parse_filter(filter: &str) -> Result<SessionFilter, AppError> {
    let value: serde_json::Value = serde_json::from_str(filter)
        .map_err(|e| AppError::validation(format!("Filter is not valid JSON: {}", e)))?;
    SessionFilter::from_json(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongostore_core::error::ErrorKind;

    #[test]
    fn test_parse_session() {
        let session = parse_session(r#"{"cookie":{"path":"/"},"user":"alice"}"#).unwrap();
        assert_eq!(session.fields["user"], "alice");
        assert!(session.cookie.is_some());

        let err = parse_session("{cookie").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);

        let err = parse_session(r#"{"cookie":{"expires":"garbage"}}"#).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
    }

    #[test]
    fn test_parse_filter() {
        let filter = parse_filter(r#"{"sid":"abc123"}"#).unwrap();
        assert_eq!(filter, SessionFilter::by_sid("abc123"));
        assert!(parse_filter("[1]").is_err());
        assert!(parse_filter(r#"{"sid":{"$ne":null}}"#).is_err());
    }
}
