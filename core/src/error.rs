//! Error types for the todo client.
//!
//! # Design
//! Two layers. `ApiError` describes what went wrong with a single request or
//! response and keeps the service-provided message when there is one.
//! `SyncError` is what the engine stores in its error slot: one variant per
//! user operation, each carrying the text shown to the user.

use thiserror::Error;

/// Errors produced while building requests or interpreting responses.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// No bearer token is available for an authenticated call.
    #[error("no session token")]
    MissingToken,

    /// The service returned 404.
    #[error("resource not found")]
    NotFound { message: Option<String> },

    /// The service rejected the bearer token (401).
    #[error("unauthorized")]
    Unauthorized { message: Option<String> },

    /// Any other non-2xx status.
    #[error("HTTP {status}")]
    HttpError { status: u16, message: Option<String> },

    /// The response body could not be deserialized into the expected type.
    #[error("deserialization failed: {0}")]
    DeserializationError(String),

    /// The request payload could not be serialized to JSON.
    #[error("serialization failed: {0}")]
    SerializationError(String),

    /// No response was received.
    #[error("transport failed: {0}")]
    Transport(String),
}

impl ApiError {
    /// The `message` field the service attached to a failed response, if any.
    pub fn service_message(&self) -> Option<&str> {
        match self {
            ApiError::NotFound { message }
            | ApiError::Unauthorized { message }
            | ApiError::HttpError { message, .. } => message.as_deref(),
            _ => None,
        }
    }
}

/// A failed user operation, as shown in the engine's error slot.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("{0}")]
    FetchFailed(String),
    #[error("{0}")]
    CreateFailed(String),
    /// Covers both completion toggles and text edits.
    #[error("{0}")]
    UpdateFailed(String),
    #[error("{0}")]
    DeleteFailed(String),
    #[error("{0}")]
    LogoutFailed(String),
}

impl SyncError {
    pub fn message(&self) -> &str {
        match self {
            SyncError::FetchFailed(m)
            | SyncError::CreateFailed(m)
            | SyncError::UpdateFailed(m)
            | SyncError::DeleteFailed(m)
            | SyncError::LogoutFailed(m) => m,
        }
    }
}
