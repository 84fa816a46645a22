//! Shared primitives for all Rust crates in Schemata.

#![forbid(unsafe_code)]

/// Editor identity primitives shared across services.
pub mod auth;
mod ids;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use auth::EditorIdentity;
pub use ids::{EntityId, FieldId, LookupId, SessionId};

/// Result type used across Schemata crates.
pub type AppResult<T> = Result<T, AppError>;

/// A validated non-empty UTF-8 string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonEmptyString(String);

impl NonEmptyString {
    /// Creates a validated non-empty string.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::Validation(
                "value must not be empty or whitespace".to_owned(),
            ));
        }

        Ok(Self(value))
    }

    /// Returns the underlying string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<NonEmptyString> for String {
    fn from(value: NonEmptyString) -> Self {
        value.0
    }
}

/// Common application error categories.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// Local validation failure. Never sent to the backend.
    #[error("validation error: {0}")]
    Validation(String),

    /// The backend rejected a draft edit operation.
    #[error("draft operation rejected ({code}): {message}")]
    DraftOperation {
        /// Error code returned by the backend.
        code: String,
        /// Human readable message returned by the backend.
        message: String,
    },

    /// Commit failed because the draft is outdated or breaks a server-side rule.
    #[error("commit conflict: {0}")]
    CommitConflict(String),

    /// Edit attempted on a draft invalidated by a concurrent commit.
    #[error("stale draft: {0}")]
    StaleDraft(String),

    /// Requested resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Internal unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns a stable discriminator for the error category.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::DraftOperation { .. } => "draft_operation",
            Self::CommitConflict(_) => "commit_conflict",
            Self::StaleDraft(_) => "stale_draft",
            Self::NotFound(_) => "not_found",
            Self::Internal(_) => "internal",
        }
    }

    /// Builds a draft operation error from a backend error payload.
    ///
    /// Payloads of the form `key:<code>` carry a message key; the prefix is
    /// stripped so only the code remains.
    #[must_use]
    pub fn draft_operation(payload: impl Into<String>) -> Self {
        let payload = payload.into();
        let code = payload
            .strip_prefix("key:")
            .map(str::trim)
            .unwrap_or_else(|| payload.trim())
            .to_owned();

        Self::draft_rejection(code, payload)
    }

    /// Builds a draft operation error from a known code. A blank code falls
    /// back to the generic `draftSave`.
    #[must_use]
    pub fn draft_rejection(code: impl Into<String>, message: impl Into<String>) -> Self {
        let code = code.into();
        Self::DraftOperation {
            code: if code.trim().is_empty() {
                "draftSave".to_owned()
            } else {
                code
            },
            message: message.into(),
        }
    }
}
