//! Protocol dispatch: what a validated message does.
//!
//! The dispatcher takes one classified [`Message`] from one connection and
//! decides the outcome. It mutates the session registry and talks to the
//! directory, but it never touches a socket: it returns a list of
//! [`Outbound`] actions and the reactor carries them out in order.
//!
//! # Connection state
//!
//! ```text
//!   Unauthenticated ──(presence ok)──→ Authenticated(name) ──(exit)──→ Closed
//!        │    ↑                               │
//!        └────┘ presence with a taken name    └── any failure ──→ Closed
//! ```
//!
//! The registry is the source of truth for this state: a connection is
//! authenticated exactly when the registry has a session for it.

use std::net::SocketAddr;

use murmur_directory::DirectoryHandle;
use murmur_protocol::{AccountName, Message, Response};
use murmur_session::SessionRegistry;
use murmur_transport::ConnectionId;

/// One thing the reactor must do after a message was dispatched.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Send a reply to the connection the message came from.
    Reply(Response),

    /// Forward the inbound frame, byte for byte, to another connection.
    Relay { to: ConnectionId },

    /// Close the originating connection.
    Close,
}

/// Where a connection stands in the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnState {
    Unauthenticated,
    Authenticated(AccountName),
}

impl ConnState {
    /// Reads the state of `conn` off the registry.
    pub fn of(registry: &SessionRegistry, conn: ConnectionId) -> Self {
        match registry.name_of(conn) {
            Some(name) => Self::Authenticated(name.clone()),
            None => Self::Unauthenticated,
        }
    }
}

fn reject(reason: impl Into<String>) -> Vec<Outbound> {
    vec![Outbound::Reply(Response::rejected(reason))]
}

/// Runs one message from `conn` through the protocol.
///
/// Never fails: every rejected path comes back as a reply.
pub async fn dispatch(
    registry: &mut SessionRegistry,
    directory: &DirectoryHandle,
    conn: ConnectionId,
    peer: SocketAddr,
    message: Message,
) -> Vec<Outbound> {
    let me = match (ConnState::of(registry, conn), &message) {
        (ConnState::Unauthenticated, Message::Presence { user, .. }) => {
            return presence(registry, directory, conn, peer, user.account_name.clone());
        }
        (ConnState::Unauthenticated, other) => {
            return reject(format!(
                "presence required before `{}`",
                other.action()
            ));
        }
        (ConnState::Authenticated(me), Message::Presence { .. }) => {
            return reject(format!("already registered as {me}"));
        }
        (ConnState::Authenticated(me), _) => me,
    };

    // Exit always ends the connection's own session, whatever name it
    // carries.
    if let Message::Exit { .. } = message {
        registry.unbind(me.as_str());
        directory.logout(me.clone());
        tracing::info!(%conn, name = %me, "client exited");
        return vec![Outbound::Reply(Response::ExitAck), Outbound::Close];
    }

    if message.account() != &me {
        return reject(format!(
            "`{}` does not match the session name {me}",
            message.account()
        ));
    }

    match message {
        Message::Chat(chat) => match registry.lookup(chat.to.as_str()) {
            Ok(to) => {
                directory.record_traffic(chat.from.clone(), chat.to.clone());
                tracing::debug!(from = %chat.from, to = %chat.to, "relaying message");
                vec![Outbound::Relay { to }]
            }
            Err(e) => vec![Outbound::Reply(Response::Unreachable {
                reason: e.to_string(),
            })],
        },

        Message::ContactsRequest { user, .. } => match directory.contacts(user).await {
            Ok(names) => vec![Outbound::Reply(Response::ContactList { names })],
            Err(e) => reject(e.to_string()),
        },

        Message::UsersRequest { .. } => match directory.list_accounts().await {
            Ok(names) => vec![Outbound::Reply(Response::ContactList { names })],
            Err(e) => reject(e.to_string()),
        },

        Message::ContactAdd { user, contact, .. } => {
            match directory.add_contact(user, contact.clone()).await {
                Ok(()) => vec![Outbound::Reply(Response::Ack {
                    alert: format!("{contact} added to contacts"),
                })],
                Err(e) => reject(e.to_string()),
            }
        }

        Message::ContactRemove { user, contact, .. } => {
            match directory.remove_contact(user, contact.clone()).await {
                Ok(true) => vec![Outbound::Reply(Response::Ack {
                    alert: format!("{contact} removed from contacts"),
                })],
                Ok(false) => vec![Outbound::Reply(Response::Notice {
                    alert: format!("{contact} is not in your contacts"),
                })],
                Err(e) => reject(e.to_string()),
            }
        }

        // Handled above.
        Message::Presence { .. } | Message::Exit { .. } => Vec::new(),
    }
}

fn presence(
    registry: &mut SessionRegistry,
    directory: &DirectoryHandle,
    conn: ConnectionId,
    peer: SocketAddr,
    name: AccountName,
) -> Vec<Outbound> {
    match registry.bind(name.clone(), conn, peer) {
        Ok(()) => {
            directory.login(name.clone(), peer);
            vec![Outbound::Reply(Response::Welcome {
                greeting: format!("Welcome, {name}!"),
            })]
        }
        Err(e) => {
            tracing::info!(%conn, %peer, error = %e, "presence refused");
            reject(e.to_string())
        }
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Dispatch tests against a real directory actor over a
    //! `MemoryDirectory`. No sockets involved.

    use std::sync::Arc;
    use std::time::Duration;

    use murmur_directory::{spawn_directory, DirectoryConfig, MemoryDirectory};
    use murmur_protocol::{ChatMessage, User};

    use super::*;

    // -- Helpers ----------------------------------------------------------

    struct Harness {
        registry: SessionRegistry,
        directory: DirectoryHandle,
        memory: Arc<MemoryDirectory>,
    }

    impl Harness {
        fn new() -> Self {
            Self::with(MemoryDirectory::new())
        }

        fn with(memory: MemoryDirectory) -> Self {
            let memory = Arc::new(memory);
            let directory = spawn_directory(
                Arc::clone(&memory),
                DirectoryConfig {
                    queue: 64,
                    timeout: Duration::from_secs(1),
                },
            );
            Self {
                registry: SessionRegistry::new(),
                directory,
                memory,
            }
        }

        async fn send(&mut self, conn: u64, message: Message) -> Vec<Outbound> {
            dispatch(
                &mut self.registry,
                &self.directory,
                ConnectionId::new(conn),
                peer(conn),
                message,
            )
            .await
        }

        async fn login(&mut self, conn: u64, name: &str) {
            let out = self.send(conn, presence_msg(name)).await;
            assert!(matches!(
                out.as_slice(),
                [Outbound::Reply(Response::Welcome { .. })]
            ));
        }
    }

    fn peer(conn: u64) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], 40000 + conn as u16))
    }

    fn presence_msg(name: &str) -> Message {
        Message::Presence {
            time: 1_u64.into(),
            user: User {
                account_name: name.into(),
            },
        }
    }

    fn chat(from: &str, to: &str, text: &str) -> Message {
        Message::Chat(ChatMessage {
            time: 2_u64.into(),
            from: from.into(),
            to: to.into(),
            message: text.into(),
        })
    }

    fn exit(from: &str) -> Message {
        Message::Exit {
            time: 3_u64.into(),
            from: from.into(),
        }
    }

    fn code(out: &[Outbound]) -> Option<u16> {
        match out {
            [Outbound::Reply(resp), ..] => resp.code(),
            _ => None,
        }
    }

    // =====================================================================
    // presence
    // =====================================================================

    #[tokio::test]
    async fn test_dispatch_presence_binds_and_welcomes() {
        let mut h = Harness::new();
        let out = h.send(1, presence_msg("alice")).await;

        assert_eq!(
            out,
            vec![Outbound::Reply(Response::Welcome {
                greeting: "Welcome, alice!".into()
            })]
        );
        assert_eq!(h.registry.lookup("alice").unwrap(), ConnectionId::new(1));
    }

    #[tokio::test]
    async fn test_dispatch_presence_taken_name_rejects_and_keeps_first() {
        let mut h = Harness::new();
        h.login(1, "alice").await;

        let out = h.send(2, presence_msg("alice")).await;

        assert_eq!(code(&out), Some(400));
        assert_eq!(out.len(), 1, "no Close for a taken name");
        assert_eq!(h.registry.lookup("alice").unwrap(), ConnectionId::new(1));
        assert_eq!(
            ConnState::of(&h.registry, ConnectionId::new(2)),
            ConnState::Unauthenticated
        );
    }

    #[tokio::test]
    async fn test_dispatch_presence_twice_rejected() {
        let mut h = Harness::new();
        h.login(1, "alice").await;

        let out = h.send(1, presence_msg("alicia")).await;

        assert_eq!(code(&out), Some(400));
        assert_eq!(h.registry.name_of(ConnectionId::new(1)).unwrap().as_str(), "alice");
    }

    #[tokio::test]
    async fn test_dispatch_presence_queues_login() {
        let mut h = Harness::new();
        h.login(1, "alice").await;

        // A query is a barrier for the login queued before it.
        h.directory.list_accounts().await.unwrap();
        assert_eq!(h.memory.active_sessions()[0].peer, peer(1));
    }

    // =====================================================================
    // unauthenticated / identity
    // =====================================================================

    #[tokio::test]
    async fn test_dispatch_before_presence_rejected() {
        let mut h = Harness::new();
        for msg in [chat("alice", "bob", "hi"), exit("alice")] {
            let out = h.send(1, msg).await;
            assert_eq!(code(&out), Some(400));
            assert_eq!(out.len(), 1);
        }
        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_foreign_account_field_rejected() {
        let mut h = Harness::new();
        h.login(1, "alice").await;
        h.login(2, "bob").await;

        let out = h.send(1, chat("bob", "alice", "spoofed")).await;

        assert_eq!(code(&out), Some(400));
        assert!(!out.iter().any(|o| matches!(o, Outbound::Relay { .. })));
    }

    // =====================================================================
    // chat
    // =====================================================================

    #[tokio::test]
    async fn test_dispatch_chat_online_relays_once_to_recipient() {
        let mut h = Harness::new();
        h.login(1, "alice").await;
        h.login(2, "bob").await;

        let out = h.send(1, chat("alice", "bob", "hello bob")).await;

        assert_eq!(
            out,
            vec![Outbound::Relay {
                to: ConnectionId::new(2)
            }]
        );
    }

    #[tokio::test]
    async fn test_dispatch_chat_offline_is_unreachable_to_sender() {
        let mut h = Harness::new();
        h.login(1, "alice").await;

        let out = h.send(1, chat("alice", "bob", "anyone?")).await;

        assert_eq!(out.len(), 1);
        assert_eq!(code(&out), Some(406));
    }

    #[tokio::test]
    async fn test_dispatch_chat_records_traffic() {
        let mut h = Harness::new();
        h.login(1, "alice").await;
        h.login(2, "bob").await;
        h.send(1, chat("alice", "bob", "one")).await;
        h.send(1, chat("alice", "bob", "two")).await;

        h.directory.list_accounts().await.unwrap();
        let stats = h.memory.traffic_stats();
        assert_eq!(stats[0].sent, 2);
        assert_eq!(stats[1].received, 2);
    }

    // =====================================================================
    // exit
    // =====================================================================

    #[tokio::test]
    async fn test_dispatch_exit_unbinds_and_closes() {
        let mut h = Harness::new();
        h.login(1, "alice").await;

        let out = h.send(1, exit("alice")).await;

        assert_eq!(out, vec![Outbound::Reply(Response::ExitAck), Outbound::Close]);
        assert!(h.registry.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_exit_with_other_name_still_unbinds_own_session() {
        let mut h = Harness::new();
        h.login(1, "alice").await;
        h.login(2, "bob").await;

        let out = h.send(1, exit("bob")).await;

        assert_eq!(out.last(), Some(&Outbound::Close));
        assert!(h.registry.lookup("alice").is_err());
        assert_eq!(h.registry.lookup("bob").unwrap(), ConnectionId::new(2));
    }

    // =====================================================================
    // contacts
    // =====================================================================

    #[tokio::test]
    async fn test_dispatch_contact_flow() {
        let mut h = Harness::with(MemoryDirectory::with_accounts(["bob"]));
        h.login(1, "alice").await;

        let add = Message::ContactAdd {
            time: 1_u64.into(),
            user: "alice".into(),
            contact: "bob".into(),
        };
        assert_eq!(code(&h.send(1, add).await), Some(200));

        let list = h
            .send(
                1,
                Message::ContactsRequest {
                    time: 1_u64.into(),
                    user: "alice".into(),
                },
            )
            .await;
        assert_eq!(
            list,
            vec![Outbound::Reply(Response::ContactList {
                names: vec!["bob".into()]
            })]
        );

        let del = Message::ContactRemove {
            time: 1_u64.into(),
            user: "alice".into(),
            contact: "bob".into(),
        };
        assert_eq!(code(&h.send(1, del.clone()).await), Some(200));
        assert_eq!(code(&h.send(1, del).await), Some(206));
    }

    #[tokio::test]
    async fn test_dispatch_add_unknown_contact_rejected() {
        let mut h = Harness::new();
        h.login(1, "alice").await;

        let out = h
            .send(
                1,
                Message::ContactAdd {
                    time: 1_u64.into(),
                    user: "alice".into(),
                    contact: "nobody".into(),
                },
            )
            .await;

        assert_eq!(code(&out), Some(400));
    }

    #[tokio::test]
    async fn test_dispatch_users_request_lists_known_accounts() {
        let mut h = Harness::with(MemoryDirectory::with_accounts(["carol"]));
        h.login(1, "alice").await;

        let out = h
            .send(
                1,
                Message::UsersRequest {
                    time: 1_u64.into(),
                    account_name: "alice".into(),
                },
            )
            .await;

        assert_eq!(
            out,
            vec![Outbound::Reply(Response::ContactList {
                names: vec!["alice".into(), "carol".into()]
            })]
        );
    }
}
