//! Directory actor: a Tokio task that owns the directory backend.
//!
//! The server never calls a [`Directory`] directly. It holds a
//! [`DirectoryHandle`] and sends commands through one bounded mpsc queue.
//! Because there is a single queue, commands are applied in the order they
//! were sent: a login queued before a contacts query is visible to that
//! query.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use murmur_protocol::AccountName;
use tokio::sync::{mpsc, oneshot};
use tokio::sync::mpsc::error::TrySendError;

use crate::{Directory, DirectoryConfig, DirectoryError};

type Reply<T> = oneshot::Sender<Result<T, DirectoryError>>;

/// Commands sent to the directory actor.
///
/// Telemetry variants carry no reply channel; query variants carry a
/// `oneshot` the actor answers on.
enum DirectoryCommand {
    Login {
        name: AccountName,
        peer: SocketAddr,
    },
    Logout {
        name: AccountName,
    },
    RecordTraffic {
        sender: AccountName,
        recipient: AccountName,
    },
    ListAccounts {
        reply: Reply<Vec<AccountName>>,
    },
    Contacts {
        name: AccountName,
        reply: Reply<Vec<AccountName>>,
    },
    AddContact {
        name: AccountName,
        contact: AccountName,
        reply: Reply<()>,
    },
    RemoveContact {
        name: AccountName,
        contact: AccountName,
        reply: Reply<bool>,
    },
}

impl DirectoryCommand {
    fn label(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::Logout { .. } => "logout",
            Self::RecordTraffic { .. } => "record_traffic",
            Self::ListAccounts { .. } => "list_accounts",
            Self::Contacts { .. } => "contacts",
            Self::AddContact { .. } => "add_contact",
            Self::RemoveContact { .. } => "remove_contact",
        }
    }
}

// ---------------------------------------------------------------------------
// DirectoryHandle
// ---------------------------------------------------------------------------

/// Handle to a running directory actor.
///
/// Cheap to clone: it's an `mpsc::Sender` plus the query timeout. The
/// actor stops once every handle is dropped.
#[derive(Debug, Clone)]
pub struct DirectoryHandle {
    sender: mpsc::Sender<DirectoryCommand>,
    timeout: Duration,
}

impl DirectoryHandle {
    /// Queues a login event. Never waits.
    pub fn login(&self, name: AccountName, peer: SocketAddr) {
        self.notify(DirectoryCommand::Login { name, peer });
    }

    /// Queues a logout event. Never waits.
    pub fn logout(&self, name: AccountName) {
        self.notify(DirectoryCommand::Logout { name });
    }

    /// Queues a traffic counter update. Never waits.
    pub fn record_traffic(&self, sender: AccountName, recipient: AccountName) {
        self.notify(DirectoryCommand::RecordTraffic { sender, recipient });
    }

    /// Fetches every known account.
    pub async fn list_accounts(&self) -> Result<Vec<AccountName>, DirectoryError> {
        let (reply, rx) = oneshot::channel();
        self.query(DirectoryCommand::ListAccounts { reply }, rx).await
    }

    /// Fetches `name`'s contacts.
    pub async fn contacts(&self, name: AccountName) -> Result<Vec<AccountName>, DirectoryError> {
        let (reply, rx) = oneshot::channel();
        self.query(DirectoryCommand::Contacts { name, reply }, rx)
            .await
    }

    /// Adds `contact` to `name`'s contacts.
    pub async fn add_contact(
        &self,
        name: AccountName,
        contact: AccountName,
    ) -> Result<(), DirectoryError> {
        let (reply, rx) = oneshot::channel();
        self.query(
            DirectoryCommand::AddContact {
                name,
                contact,
                reply,
            },
            rx,
        )
        .await
    }

    /// Removes `contact` from `name`'s contacts. `false` if it wasn't there.
    pub async fn remove_contact(
        &self,
        name: AccountName,
        contact: AccountName,
    ) -> Result<bool, DirectoryError> {
        let (reply, rx) = oneshot::channel();
        self.query(
            DirectoryCommand::RemoveContact {
                name,
                contact,
                reply,
            },
            rx,
        )
        .await
    }

    fn notify(&self, cmd: DirectoryCommand) {
        let op = cmd.label();
        match self.sender.try_send(cmd) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                tracing::warn!(op, "directory queue full, event dropped");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(op, "directory is gone, event dropped");
            }
        }
    }

    async fn query<T>(
        &self,
        cmd: DirectoryCommand,
        rx: oneshot::Receiver<Result<T, DirectoryError>>,
    ) -> Result<T, DirectoryError> {
        let op = cmd.label();
        let exchange = async {
            self.sender
                .send(cmd)
                .await
                .map_err(|_| DirectoryError::Unavailable)?;
            rx.await.map_err(|_| DirectoryError::Unavailable)?
        };
        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(op, timeout = ?self.timeout, "directory query timed out");
                Err(DirectoryError::TimedOut(self.timeout))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct DirectoryActor<D: Directory> {
    directory: Arc<D>,
    receiver: mpsc::Receiver<DirectoryCommand>,
}

impl<D: Directory> DirectoryActor<D> {
    /// Runs until every handle is dropped.
    async fn run(mut self) {
        tracing::info!("directory actor started");

        while let Some(cmd) = self.receiver.recv().await {
            let op = cmd.label();
            let dir = &*self.directory;
            match cmd {
                DirectoryCommand::Login { name, peer } => {
                    log_telemetry(op, &name, dir.login(&name, peer).await);
                }
                DirectoryCommand::Logout { name } => {
                    log_telemetry(op, &name, dir.logout(&name).await);
                }
                DirectoryCommand::RecordTraffic { sender, recipient } => {
                    let result = dir.record_traffic(&sender, &recipient).await;
                    log_telemetry(op, &sender, result);
                }
                DirectoryCommand::ListAccounts { reply } => {
                    let _ = reply.send(dir.list_accounts().await);
                }
                DirectoryCommand::Contacts { name, reply } => {
                    let _ = reply.send(dir.contacts(&name).await);
                }
                DirectoryCommand::AddContact {
                    name,
                    contact,
                    reply,
                } => {
                    let _ = reply.send(dir.add_contact(&name, &contact).await);
                }
                DirectoryCommand::RemoveContact {
                    name,
                    contact,
                    reply,
                } => {
                    let _ = reply.send(dir.remove_contact(&name, &contact).await);
                }
            }
        }

        tracing::info!("directory actor stopped");
    }
}

fn log_telemetry(op: &'static str, name: &AccountName, result: Result<(), DirectoryError>) {
    match result {
        Ok(()) => tracing::debug!(op, %name, "directory updated"),
        Err(e) => tracing::warn!(op, %name, error = %e, "directory update failed"),
    }
}

/// Spawns a directory actor over `directory` and returns a handle to it.
///
/// Must be called from within a Tokio runtime.
pub fn spawn_directory<D: Directory>(directory: Arc<D>, config: DirectoryConfig) -> DirectoryHandle {
    let (tx, rx) = mpsc::channel(config.queue.max(1));

    let actor = DirectoryActor {
        directory,
        receiver: rx,
    };
    tokio::spawn(actor.run());

    DirectoryHandle {
        sender: tx,
        timeout: config.timeout,
    }
}
