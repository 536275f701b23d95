//! Unified error type for Murmur.

use murmur_directory::DirectoryError;
use murmur_protocol::ProtocolError;
use murmur_session::SessionError;
use murmur_transport::TransportError;

use crate::config::ConfigError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` attribute on each variant generates a `From` impl, so
/// `?` converts sub-crate errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum MurmurError {
    /// A transport-level error (bind, accept, send, receive, oversize line).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A protocol-level error (encode, decode, schema).
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A session-level error (name taken, not online).
    #[error(transparent)]
    Session(#[from] SessionError),

    /// A directory-level error (unknown account, unavailable, timeout).
    #[error(transparent)]
    Directory(#[from] DirectoryError),

    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
