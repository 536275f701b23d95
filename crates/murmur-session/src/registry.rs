//! The session registry: which account is online on which connection.
//!
//! # Concurrency note
//!
//! `SessionRegistry` is NOT thread-safe by itself. It uses plain
//! `HashMap`s and is owned by the reactor task, which is the only writer.
//! Other tasks read the online set through a [`Roster`] handle instead.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use murmur_protocol::AccountName;
use murmur_transport::ConnectionId;

use crate::{OnlineUser, Roster, Session, SessionError};

/// Maps account names to live connections, one to one.
///
/// ## Lifecycle
///
/// ```text
/// presence ──→ bind() ──→ [online] ──→ unbind() / unbind_by_connection()
///                 │
///                 └── name taken ──→ NameTaken (existing session kept)
/// ```
#[derive(Debug, Default)]
pub struct SessionRegistry {
    /// Sessions keyed by account name.
    by_name: HashMap<AccountName, Session>,

    /// Reverse index, kept in sync with `by_name`.
    by_conn: HashMap<ConnectionId, AccountName>,

    roster: Roster,
}

impl SessionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `name` to `conn`.
    ///
    /// # Errors
    /// Returns [`SessionError::NameTaken`] if the name is already bound.
    /// The existing session is not modified.
    pub fn bind(
        &mut self,
        name: AccountName,
        conn: ConnectionId,
        peer: SocketAddr,
    ) -> Result<(), SessionError> {
        if self.by_name.contains_key(&name) {
            return Err(SessionError::NameTaken(name));
        }
        // A connection carries at most one session; rebinding replaces it.
        if let Some(previous) = self.by_conn.remove(&conn) {
            self.by_name.remove(&previous);
        }

        let session = Session {
            name: name.clone(),
            conn,
            peer,
            since: Instant::now(),
        };
        self.by_conn.insert(conn, name.clone());
        self.by_name.insert(name.clone(), session);
        self.publish();

        tracing::info!(%name, %conn, %peer, "session bound");
        Ok(())
    }

    /// Removes the session for `name`, if any.
    ///
    /// Idempotent: unbinding an absent name returns `None` and changes
    /// nothing.
    pub fn unbind(&mut self, name: &str) -> Option<Session> {
        let session = self.by_name.remove(name)?;
        self.by_conn.remove(&session.conn);
        self.publish();

        tracing::info!(name = %session.name, conn = %session.conn, "session unbound");
        Some(session)
    }

    /// Removes whichever session `conn` carries, if any.
    pub fn unbind_by_connection(&mut self, conn: ConnectionId) -> Option<Session> {
        let name = self.by_conn.get(&conn)?.clone();
        self.unbind(name.as_str())
    }

    /// Resolves an account name to its connection.
    ///
    /// # Errors
    /// Returns [`SessionError::NotFound`] if nobody is online under `name`.
    pub fn lookup(&self, name: &str) -> Result<ConnectionId, SessionError> {
        self.by_name
            .get(name)
            .map(|session| session.conn)
            .ok_or_else(|| SessionError::NotFound(AccountName::from(name)))
    }

    /// Returns the account bound to `conn`, if any.
    pub fn name_of(&self, conn: ConnectionId) -> Option<&AccountName> {
        self.by_conn.get(&conn)
    }

    /// Returns the session for `name`, if any.
    pub fn get(&self, name: &str) -> Option<&Session> {
        self.by_name.get(name)
    }

    /// Returns the number of online sessions.
    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Returns `true` if nobody is online.
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    /// Iterates over online sessions in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Session> {
        self.by_name.values()
    }

    /// Returns a handle onto the published mirror of this registry.
    pub fn roster(&self) -> Roster {
        self.roster.clone()
    }

    fn publish(&self) {
        self.roster
            .publish(self.by_name.values().map(OnlineUser::from).collect());
    }
}

// =========================================================================
// Tests
// =========================================================================
