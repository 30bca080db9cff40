use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    Forbidden,
    NotFound,
    Validation,
    Conflict,
    Internal,
}

/// JSON error body returned by the backend on non-2xx responses.
///
/// Only `message` is required; older routes send `{ "message": "..." }` alone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<ErrorCode>,
    pub message: String,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            message: message.into(),
        }
    }

    /// The server-supplied message, if it carries any text.
    pub fn display_message(&self) -> Option<&str> {
        let trimmed = self.message.trim();
        (!trimmed.is_empty()).then_some(trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_body_without_code() {
        let body: ApiError =
            serde_json::from_str(r#"{"message":"Evento lotado"}"#).expect("parse body");
        assert!(body.code.is_none());
        assert_eq!(body.display_message(), Some("Evento lotado"));
    }

    #[test]
    fn blank_message_is_not_displayed() {
        let body = ApiError::new(ErrorCode::Internal, "   ");
        assert_eq!(body.display_message(), None);
    }
}
