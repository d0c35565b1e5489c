use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body of every non-2xx response from the platform API.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Value,
}

impl ErrorBody {
    pub fn new(detail: impl Into<String>) -> Self {
        Self {
            detail: Value::String(detail.into()),
        }
    }

    /// Human-readable message, verbatim when the server sent a string and as
    /// compact JSON when it sent a structured detail (e.g. field validation lists).
    pub fn message(&self) -> Option<String> {
        match &self.detail {
            Value::Null => None,
            Value::String(text) if text.trim().is_empty() => None,
            Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_detail_is_returned_verbatim() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"detail":"Track already started"}"#).expect("decode");
        assert_eq!(body.message().as_deref(), Some("Track already started"));
    }

    #[test]
    fn structured_detail_is_rendered_as_json() {
        let body: ErrorBody =
            serde_json::from_str(r#"{"detail":[{"loc":["body","score"],"msg":"bad"}]}"#)
                .expect("decode");
        assert_eq!(
            body.message().as_deref(),
            Some(r#"[{"loc":["body","score"],"msg":"bad"}]"#)
        );
    }

    #[test]
    fn missing_detail_has_no_message() {
        let body: ErrorBody = serde_json::from_str("{}").expect("decode");
        assert_eq!(body.message(), None);
    }
}
