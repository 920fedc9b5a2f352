//! Equality filters for counting sessions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::AppError;
use crate::result::AppResult;

/// A conjunction of equality predicates on session document fields.
///
/// Keys are field paths in dotted notation (`"cookie.path"`, `"user.id"`);
/// the document a filter is matched against includes the `sid` field. The
/// serialized form is the plain JSON object `{path: value, ...}`, which is
/// also a valid MongoDB query document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionFilter(Map<String, Value>);

impl SessionFilter {
    /// A filter matching every session.
    pub fn all() -> Self {
        Self::default()
    }

    /// A filter matching the session with the given id.
    pub fn by_sid(sid: impl Into<String>) -> Self {
        let sid: String = sid.into();
        Self::all().eq("sid", sid)
    }

    /// Add an equality predicate on `path`.
    pub fn eq(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(path.into(), value.into());
        self
    }

    /// Parse a filter from a JSON object.
    ///
    /// Query operators (`$`-prefixed keys, at the top level or directly
    /// inside a value) are rejected: every backend evaluates equality only.
    pub fn from_json(value: Value) -> AppResult<Self> {
        let map = match value {
            Value::Object(map) => map,
            other => {
                return Err(AppError::validation(format!(
                    "session filter must be a JSON object, got {other}"
                )));
            }
        };

        for (path, expected) in &map {
            let operator = is_operator(path).then_some(path.as_str()).or_else(|| {
                expected
                    .as_object()
                    .and_then(|inner| inner.keys().find(|k| is_operator(k)))
                    .map(String::as_str)
            });
            if let Some(operator) = operator {
                return Err(AppError::validation(format!(
                    "session filter supports equality only, found operator '{operator}'"
                )));
            }
        }
        Ok(Self(map))
    }

    /// Whether the filter has no predicates.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The predicates as `(path, expected value)` pairs.
    pub fn predicates(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Evaluate the filter against a JSON session document.
    ///
    /// A predicate whose path does not resolve only matches `null`.
    pub fn matches(&self, document: &Value) -> bool {
        self.predicates().all(|(path, expected)| {
            match lookup(document, path) {
                Some(actual) => actual == expected,
                None => expected.is_null(),
            }
        })
    }
}

fn is_operator(key: &str) -> bool {
    key.starts_with('$')
}

fn lookup<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(document, |current, segment| current.get(segment))
}
