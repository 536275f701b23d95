//! Session types: who is online, on which connection, since when.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use murmur_protocol::AccountName;
use murmur_transport::ConnectionId;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One account bound to one live connection.
///
/// Created by a successful presence handshake. Removed when the client
/// exits, when its connection fails, or when the server shuts down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// The account name this connection registered.
    pub name: AccountName,

    /// The connection carrying this session.
    pub conn: ConnectionId,

    /// Remote address of the connection.
    pub peer: SocketAddr,

    /// When the session was bound.
    pub since: Instant,
}

// ---------------------------------------------------------------------------
// Roster
// ---------------------------------------------------------------------------

/// A point-in-time view of one online user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnlineUser {
    pub name: AccountName,
    pub peer: SocketAddr,
    pub since: Instant,
}

impl From<&Session> for OnlineUser {
    fn from(session: &Session) -> Self {
        Self {
            name: session.name.clone(),
            peer: session.peer,
            since: session.since,
        }
    }
}

/// A cloneable, thread-safe mirror of the online set.
///
/// The registry itself lives on the server task and takes no locks. It
/// republishes its contents here after every bind and unbind, so a status
/// display or a test can look at who is online without talking to the
/// server task.
///
/// ## Example
///
/// ```rust
/// use murmur_session::SessionRegistry;
///
/// let registry = SessionRegistry::new();
/// let roster = registry.roster();
/// assert!(roster.snapshot().is_empty());
/// ```
#[derive(Debug, Clone, Default)]
pub struct Roster {
    inner: Arc<Mutex<Vec<OnlineUser>>>,
}

impl Roster {
    /// Returns the online users, sorted by name.
    pub fn snapshot(&self) -> Vec<OnlineUser> {
        // A poisoned lock still holds the last complete publish.
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns `true` if `name` is currently online.
    pub fn contains(&self, name: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|user| user.name.as_str() == name)
    }

    /// Returns how many users are online.
    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nobody is online.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn publish(&self, mut users: Vec<OnlineUser>) {
        users.sort_by(|a, b| a.name.cmp(&b.name));
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = users;
    }
}
