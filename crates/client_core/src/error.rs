//! Failure taxonomy for wrapped operations and user-facing message derivation.

use std::time::Duration;

use thiserror::Error;

use crate::config::ErrorMessages;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Timeout,
    Cancelled,
    OperationFailure,
    ServerError,
    NotFound,
}

#[derive(Debug, Clone, Error)]
pub enum OperationError {
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("operation cancelled")]
    Cancelled,
    #[error("{message}")]
    Response {
        status: u16,
        server_message: Option<String>,
        message: String,
    },
    #[error("{0}")]
    Failure(String),
}

impl OperationError {
    pub fn failure(message: impl Into<String>) -> Self {
        Self::Failure(message.into())
    }

    /// A response-shaped failure without a transport message, e.g. a bare
    /// `{ status: 500 }` rejection.
    pub fn status(status: u16) -> Self {
        Self::Response {
            status,
            server_message: None,
            message: String::new(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Timeout(_) => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Response { status, .. } if *status >= 500 => ErrorKind::ServerError,
            Self::Response { status: 404, .. } => ErrorKind::NotFound,
            Self::Response { .. } | Self::Failure(_) => ErrorKind::OperationFailure,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Text shown to the user for this failure.
    ///
    /// Precedence: server-supplied message, then the status-based generic
    /// message, then the error's own text, then the configured fallback.
    pub fn user_message(&self, messages: &ErrorMessages) -> String {
        match self {
            Self::Timeout(_) => messages.timeout.clone(),
            Self::Cancelled => messages.fallback.clone(),
            Self::Response {
                status,
                server_message,
                message,
            } => {
                if let Some(text) = non_blank(server_message.as_deref()) {
                    return text.to_string();
                }
                if *status >= 500 {
                    return messages.server_error.clone();
                }
                if *status == 404 {
                    return messages.not_found.clone();
                }
                non_blank(Some(message))
                    .map(str::to_string)
                    .unwrap_or_else(|| messages.fallback.clone())
            }
            Self::Failure(message) => non_blank(Some(message))
                .map(str::to_string)
                .unwrap_or_else(|| messages.fallback.clone()),
        }
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.map(str::trim).filter(|text| !text.is_empty())
}

impl From<reqwest::Error> for OperationError {
    fn from(err: reqwest::Error) -> Self {
        match err.status() {
            Some(status) => Self::Response {
                status: status.as_u16(),
                server_message: None,
                message: err.to_string(),
            },
            None => Self::Failure(err.to_string()),
        }
    }
}

#[cfg(test)]
#[path = "tests/error_tests.rs"]
mod tests;
