//! Contact directory for Murmur.
//!
//! The directory knows every account that has ever logged in, each
//! account's contact list, and some bookkeeping (who is online from where,
//! a login/logout history, per-account message counters). The server never
//! caches any of it beyond a single request.
//!
//! # Key types
//!
//! - [`Directory`]: the contract a storage backend implements
//! - [`MemoryDirectory`]: the in-memory backend that ships with Murmur
//! - [`DirectoryHandle`]: send commands to a running directory actor
//! - [`DirectoryConfig`]: queue depth and query timeout

mod actor;
mod config;
mod directory;
mod error;
mod memory;

pub use actor::{spawn_directory, DirectoryHandle};
pub use config::DirectoryConfig;
pub use directory::Directory;
pub use error::DirectoryError;
pub use memory::{
    AccountRecord, ActiveSession, HistoryEvent, HistoryKind, MemoryDirectory,
    TrafficStats,
};
