//! Errors raised below the store boundary.
//!
//! - [`ApiError`] classifies the outcome of a backend call.
//! - [`StorageError`] is raised by the persistence port.
//! - [`ValidationError`] short-circuits an action before any request is made.
//!
//! Stores never hand these to their callers: they turn them into the message
//! kept in their `error` field and report a plain `bool`.
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// 401. The stored token has already been cleared when this is returned.
    #[error("not authenticated")]
    Unauthenticated,
    /// 403.
    #[error("not authorized")]
    Forbidden,
    /// 422, with the message the backend put in the body.
    #[error("{0}")]
    ValidationFailed(String),
    /// Any other non-2xx status.
    #[error("request failed with status {0}")]
    RequestFailed(u16),
    #[error("network unavailable: {0}")]
    NetworkUnavailable(#[from] reqwest::Error),
    #[error("invalid endpoint {0}")]
    InvalidEndpoint(String),
    #[error("unexpected payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// `true` for errors classified from an HTTP status, whose message is
    /// meaningful to a user as is.
    pub fn is_status(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated | Self::Forbidden | Self::ValidationFailed(_) | Self::RequestFailed(_)
        )
    }

    /// Message to show for a failed action: the classified message when
    /// there is one, `fallback` otherwise.
    pub fn user_message(&self, fallback: &str) -> String {
        if self.is_status() {
            self.to_string()
        } else {
            fallback.to_string()
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("name must not be empty")]
    EmptyName,
    #[error("label must not be empty")]
    EmptyLabel,
    #[error("email must not be empty")]
    EmptyEmail,
    #[error("password must not be empty")]
    EmptyPassword,
    #[error("password must be at least {min} characters long")]
    PasswordTooShort { min: usize },
    #[error("amount must be greater than zero")]
    NonPositiveAmount,
    #[error("you must be logged in")]
    NotAuthenticated,
}
