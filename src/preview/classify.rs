//! Normalization of arbitrary remote error shapes into one user-facing string.

use std::fmt;

use serde_json::{json, Value};

/// Message for a missing error value.
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Reduce an error value to a single message.
///
/// Precedence: `body.message`, then a string `body`, then top-level
/// `message`, then the JSON serialization of the whole value. Empty strings
/// are skipped.
pub fn safe_message(err: &Value) -> String {
    if err.is_null() {
        return UNKNOWN_ERROR.to_string();
    }
    if let Value::String(s) = err {
        return s.clone();
    }

    let body = err.get("body");
    let candidates = [
        body.and_then(|b| b.get("message")),
        body,
        err.get("message"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|v| v.as_str().filter(|s| !s.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string())
}

/// A failure reported by a remote collaborator, in whatever shape it arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteError(Value);

impl RemoteError {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// `{ "message": msg }`
    pub fn with_message(msg: impl Into<String>) -> Self {
        Self(json!({ "message": msg.into() }))
    }

    /// `{ "body": { "message": msg } }`
    pub fn with_body_message(msg: impl Into<String>) -> Self {
        Self(json!({ "body": { "message": msg.into() } }))
    }

    pub fn value(&self) -> &Value {
        &self.0
    }

    /// The classified message.
    pub fn message(&self) -> String {
        safe_message(&self.0)
    }

    /// Whether the classified message mentions "not found", in any case.
    pub fn is_not_found(&self) -> bool {
        self.message().to_lowercase().contains("not found")
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for RemoteError {}

impl From<Value> for RemoteError {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_is_unknown() {
        assert_eq!(safe_message(&Value::Null), "Unknown error");
    }

    #[test]
    fn test_body_message_beats_top_level() {
        let err = json!({ "body": { "message": "oops" }, "message": "other" });
        assert_eq!(safe_message(&err), "oops");
    }

    #[test]
    fn test_string_body_beats_top_level() {
        let err = json!({ "body": "raw body", "message": "other" });
        assert_eq!(safe_message(&err), "raw body");
    }

    #[test]
    fn test_top_level_message() {
        let err = json!({ "message": "top", "status": 500 });
        assert_eq!(safe_message(&err), "top");
    }

    #[test]
    fn test_serialization_fallback() {
        let err = json!({ "status": 500 });
        assert_eq!(safe_message(&err), r#"{"status":500}"#);
        assert_eq!(safe_message(&json!(42)), "42");
    }

    #[test]
    fn test_empty_body_message_is_skipped() {
        let err = json!({ "body": { "message": "" }, "message": "fallback" });
        assert_eq!(safe_message(&err), "fallback");
    }

    #[test]
    fn test_not_found_detection() {
        assert!(RemoteError::with_body_message("File Not Found: a.pdf").is_not_found());
        assert!(!RemoteError::with_message("timeout").is_not_found());
        assert_eq!(RemoteError::with_message("timeout").to_string(), "timeout");
    }
}
