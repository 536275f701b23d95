//! Online session tracking for Murmur.
//!
//! A session binds one account name to exactly one live connection. This
//! crate keeps that mapping ([`SessionRegistry`]) and a read-only mirror of
//! it for observers outside the server task ([`Roster`]).
//!
//! # How it fits in the stack
//!
//! ```text
//! Dispatcher (above)  ← binds on presence, resolves chat recipients
//!     ↕
//! Session Layer (this crate)  ← name ↔ connection bookkeeping
//!     ↕
//! Protocol / Transport (below)  ← AccountName, ConnectionId
//! ```

mod error;
mod registry;
mod session;

pub use error::SessionError;
pub use registry::SessionRegistry;
pub use session::{OnlineUser, Roster, Session};
