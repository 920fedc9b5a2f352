//! Convenience result type alias for MongoStore.

use crate::error::AppError;

/// A specialized `Result` type for MongoStore operations.
///
/// Every store operation completes with exactly one of these: a value or an
/// error, never both.
pub type AppResult<T> = Result<T, AppError>;
