//! Error types for the session layer.

use murmur_protocol::AccountName;

/// Errors that can occur while binding or resolving sessions.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// Another connection already holds this account name.
    /// The existing binding is left untouched.
    #[error("name {0} is already taken")]
    NameTaken(AccountName),

    /// Nobody is online under this name.
    #[error("{0} is not online")]
    NotFound(AccountName),
}
