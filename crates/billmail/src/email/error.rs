//! Inbound email error types.

use thiserror::Error;

/// Errors that can occur while reading or parsing an inbound email.
#[derive(Error, Debug)]
pub enum EmailError {
    /// The raw message could not be fetched from the object store.
    #[error("Failed to fetch email '{key}': {reason}")]
    FetchFailed { key: String, reason: String },

    /// The raw message vanished between listing and fetching.
    #[error("Email '{0}' no longer exists")]
    Missing(String),

    /// Failed to parse the email message.
    #[error("Failed to parse email: {0}")]
    ParseError(String),
}

/// Result type for email operations.
pub type Result<T> = std::result::Result<T, EmailError>;
