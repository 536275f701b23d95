//! Error types for the directory layer.

use std::time::Duration;

use murmur_protocol::AccountName;

/// Errors that can occur during directory operations.
#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// The named account has never logged in.
    #[error("unknown account {0}")]
    UnknownAccount(AccountName),

    /// The directory actor's queue is full or closed, or it dropped the
    /// reply.
    #[error("directory is unavailable")]
    Unavailable,

    /// The directory did not answer within the configured timeout.
    #[error("directory did not answer within {0:?}")]
    TimedOut(Duration),

    /// A backend-specific failure, for directories that wrap real storage.
    #[error("directory backend failed: {0}")]
    Backend(String),
}
