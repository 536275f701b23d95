//! The `Directory` trait: the contract a storage backend implements.
//!
//! Murmur only ever talks to a directory through this trait, and only from
//! the directory actor task (see [`spawn_directory`](crate::spawn_directory)).
//! A backend can therefore be slow or fail without stalling the server:
//! telemetry is fire-and-forget and queries are bounded by a timeout.

use std::future::Future;
use std::net::SocketAddr;

use murmur_protocol::AccountName;

use crate::DirectoryError;

/// Account and contact storage.
///
/// Every method returns a `Send` future so the actor can run on any
/// worker thread. Implementations may write `async fn` directly.
///
/// Two groups of operations:
/// - **Telemetry** (`login`, `logout`, `record_traffic`): the server
///   queues them and never waits for the outcome. Failures are logged.
/// - **Queries** (`list_accounts`, `contacts`, `add_contact`,
///   `remove_contact`): the server waits for the answer and turns a
///   failure into a `400` reply.
pub trait Directory: Send + Sync + 'static {
    /// Records that `name` came online from `peer`.
    ///
    /// Registers the account on first login.
    fn login(
        &self,
        name: &AccountName,
        peer: SocketAddr,
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send;

    /// Records that `name` went offline.
    fn logout(
        &self,
        name: &AccountName,
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send;

    /// Counts one message from `sender` to `recipient`.
    fn record_traffic(
        &self,
        sender: &AccountName,
        recipient: &AccountName,
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send;

    /// Returns every known account.
    fn list_accounts(
        &self,
    ) -> impl Future<Output = Result<Vec<AccountName>, DirectoryError>> + Send;

    /// Returns `name`'s contacts.
    fn contacts(
        &self,
        name: &AccountName,
    ) -> impl Future<Output = Result<Vec<AccountName>, DirectoryError>> + Send;

    /// Adds `contact` to `name`'s contacts. Adding an existing contact is
    /// a no-op.
    ///
    /// # Errors
    /// [`DirectoryError::UnknownAccount`] if either account is unknown.
    fn add_contact(
        &self,
        name: &AccountName,
        contact: &AccountName,
    ) -> impl Future<Output = Result<(), DirectoryError>> + Send;

    /// Removes `contact` from `name`'s contacts.
    ///
    /// Returns `false` if it wasn't there.
    fn remove_contact(
        &self,
        name: &AccountName,
        contact: &AccountName,
    ) -> impl Future<Output = Result<bool, DirectoryError>> + Send;
}
