//! In-memory directory backend.

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use murmur_protocol::AccountName;

use crate::{Directory, DirectoryError};

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A known account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub name: AccountName,
    pub last_login: SystemTime,
}

/// An account that is currently logged in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    pub name: AccountName,
    pub peer: SocketAddr,
    pub since: SystemTime,
}

/// Whether a history entry is a login or a logout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryKind {
    Login,
    Logout,
}

/// One entry in the login/logout history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEvent {
    pub name: AccountName,
    pub peer: SocketAddr,
    pub kind: HistoryKind,
    pub at: SystemTime,
}

/// Message counters for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrafficStats {
    pub name: AccountName,
    pub last_login: SystemTime,
    pub sent: u64,
    pub received: u64,
}

#[derive(Debug)]
struct Account {
    last_login: SystemTime,
    contacts: BTreeSet<AccountName>,
    sent: u64,
    received: u64,
}

impl Account {
    fn new(now: SystemTime) -> Self {
        Self {
            last_login: now,
            contacts: BTreeSet::new(),
            sent: 0,
            received: 0,
        }
    }
}

#[derive(Debug, Default)]
struct State {
    accounts: BTreeMap<AccountName, Account>,
    active: BTreeMap<AccountName, (SocketAddr, SystemTime)>,
    history: Vec<HistoryEvent>,
}

// ---------------------------------------------------------------------------
// MemoryDirectory
// ---------------------------------------------------------------------------

/// A [`Directory`] that keeps everything in process memory.
///
/// Shared as `Arc<MemoryDirectory>`: the actor owns one clone, and anything
/// else (a status display, a test) can keep another to call the
/// inspection methods ([`accounts`](Self::accounts),
/// [`active_sessions`](Self::active_sessions), [`history`](Self::history),
/// [`traffic_stats`](Self::traffic_stats)).
///
/// All lists come back sorted by account name, except history, which is
/// in the order events happened.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    state: Mutex<State>,
}

impl MemoryDirectory {
    /// Creates an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory that already knows `names`, as if each had
    /// logged in once.
    pub fn with_accounts<I, N>(names: I) -> Self
    where
        I: IntoIterator<Item = N>,
        N: Into<AccountName>,
    {
        let now = SystemTime::now();
        let accounts = names
            .into_iter()
            .map(|n| (n.into(), Account::new(now)))
            .collect();
        Self {
            state: Mutex::new(State {
                accounts,
                ..State::default()
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every known account with its last login time.
    pub fn accounts(&self) -> Vec<AccountRecord> {
        self.lock()
            .accounts
            .iter()
            .map(|(name, acc)| AccountRecord {
                name: name.clone(),
                last_login: acc.last_login,
            })
            .collect()
    }

    /// Accounts currently logged in.
    pub fn active_sessions(&self) -> Vec<ActiveSession> {
        self.lock()
            .active
            .iter()
            .map(|(name, (peer, since))| ActiveSession {
                name: name.clone(),
                peer: *peer,
                since: *since,
            })
            .collect()
    }

    /// The login/logout history, optionally for one account only.
    pub fn history(&self, name: Option<&str>) -> Vec<HistoryEvent> {
        self.lock()
            .history
            .iter()
            .filter(|event| name.is_none_or(|n| event.name.as_str() == n))
            .cloned()
            .collect()
    }

    /// Sent/received counters for every known account.
    pub fn traffic_stats(&self) -> Vec<TrafficStats> {
        self.lock()
            .accounts
            .iter()
            .map(|(name, acc)| TrafficStats {
                name: name.clone(),
                last_login: acc.last_login,
                sent: acc.sent,
                received: acc.received,
            })
            .collect()
    }
}

impl Directory for MemoryDirectory {
    async fn login(&self, name: &AccountName, peer: SocketAddr) -> Result<(), DirectoryError> {
        let now = SystemTime::now();
        let mut state = self.lock();
        state
            .accounts
            .entry(name.clone())
            .and_modify(|acc| acc.last_login = now)
            .or_insert_with(|| Account::new(now));
        state.active.insert(name.clone(), (peer, now));
        state.history.push(HistoryEvent {
            name: name.clone(),
            peer,
            kind: HistoryKind::Login,
            at: now,
        });
        Ok(())
    }

    async fn logout(&self, name: &AccountName) -> Result<(), DirectoryError> {
        let mut state = self.lock();
        if let Some((peer, _)) = state.active.remove(name) {
            state.history.push(HistoryEvent {
                name: name.clone(),
                peer,
                kind: HistoryKind::Logout,
                at: SystemTime::now(),
            });
        }
        Ok(())
    }

    async fn record_traffic(
        &self,
        sender: &AccountName,
        recipient: &AccountName,
    ) -> Result<(), DirectoryError> {
        let mut state = self.lock();
        if let Some(acc) = state.accounts.get_mut(sender) {
            acc.sent += 1;
        }
        if let Some(acc) = state.accounts.get_mut(recipient) {
            acc.received += 1;
        }
        Ok(())
    }

    async fn list_accounts(&self) -> Result<Vec<AccountName>, DirectoryError> {
        Ok(self.lock().accounts.keys().cloned().collect())
    }

    async fn contacts(&self, name: &AccountName) -> Result<Vec<AccountName>, DirectoryError> {
        Ok(self
            .lock()
            .accounts
            .get(name)
            .map(|acc| acc.contacts.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn add_contact(
        &self,
        name: &AccountName,
        contact: &AccountName,
    ) -> Result<(), DirectoryError> {
        let mut state = self.lock();
        if !state.accounts.contains_key(contact) {
            return Err(DirectoryError::UnknownAccount(contact.clone()));
        }
        let owner = state
            .accounts
            .get_mut(name)
            .ok_or_else(|| DirectoryError::UnknownAccount(name.clone()))?;
        owner.contacts.insert(contact.clone());
        Ok(())
    }

    async fn remove_contact(
        &self,
        name: &AccountName,
        contact: &AccountName,
    ) -> Result<bool, DirectoryError> {
        Ok(self
            .lock()
            .accounts
            .get_mut(name)
            .is_some_and(|acc| acc.contacts.remove(contact)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn name(s: &str) -> AccountName {
        AccountName::from(s)
    }

    #[tokio::test]
    async fn test_login_registers_account_and_session() {
        let dir = MemoryDirectory::new();
        dir.login(&name("alice"), peer(4000)).await.unwrap();

        assert_eq!(dir.list_accounts().await.unwrap(), vec![name("alice")]);
        let active = dir.active_sessions();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].peer, peer(4000));
    }

    #[tokio::test]
    async fn test_logout_keeps_account_and_records_history() {
        let dir = MemoryDirectory::new();
        dir.login(&name("alice"), peer(4000)).await.unwrap();
        dir.logout(&name("alice")).await.unwrap();

        assert!(dir.active_sessions().is_empty());
        assert_eq!(dir.accounts().len(), 1);
        let kinds: Vec<_> = dir.history(Some("alice")).iter().map(|e| e.kind).collect();
        assert_eq!(kinds, [HistoryKind::Login, HistoryKind::Logout]);
    }

    #[tokio::test]
    async fn test_logout_unknown_name_is_noop() {
        let dir = MemoryDirectory::new();
        dir.logout(&name("ghost")).await.unwrap();
        assert!(dir.history(None).is_empty());
    }

    #[tokio::test]
    async fn test_history_filters_by_name() {
        let dir = MemoryDirectory::new();
        dir.login(&name("alice"), peer(4000)).await.unwrap();
        dir.login(&name("bob"), peer(4001)).await.unwrap();

        assert_eq!(dir.history(None).len(), 2);
        let bob = dir.history(Some("bob"));
        assert_eq!(bob.len(), 1);
        assert_eq!(bob[0].peer, peer(4001));
    }

    #[tokio::test]
    async fn test_add_contact_known_account_ok() {
        let dir = MemoryDirectory::with_accounts(["alice", "bob"]);
        dir.add_contact(&name("alice"), &name("bob")).await.unwrap();
        dir.add_contact(&name("alice"), &name("bob")).await.unwrap();

        assert_eq!(dir.contacts(&name("alice")).await.unwrap(), vec![name("bob")]);
        assert!(dir.contacts(&name("bob")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_contact_unknown_contact_returns_unknown_account() {
        let dir = MemoryDirectory::with_accounts(["alice"]);
        let err = dir.add_contact(&name("alice"), &name("nobody")).await.unwrap_err();
        assert!(matches!(err, DirectoryError::UnknownAccount(n) if n == name("nobody")));
    }

    #[tokio::test]
    async fn test_remove_contact_reports_whether_present() {
        let dir = MemoryDirectory::with_accounts(["alice", "bob"]);
        dir.add_contact(&name("alice"), &name("bob")).await.unwrap();

        assert!(dir.remove_contact(&name("alice"), &name("bob")).await.unwrap());
        assert!(!dir.remove_contact(&name("alice"), &name("bob")).await.unwrap());
        assert!(!dir.remove_contact(&name("ghost"), &name("bob")).await.unwrap());
    }

    #[tokio::test]
    async fn test_record_traffic_counts_both_sides() {
        let dir = MemoryDirectory::with_accounts(["alice", "bob"]);
        dir.record_traffic(&name("alice"), &name("bob")).await.unwrap();
        dir.record_traffic(&name("alice"), &name("bob")).await.unwrap();

        let stats = dir.traffic_stats();
        assert_eq!((stats[0].sent, stats[0].received), (2, 0));
        assert_eq!((stats[1].sent, stats[1].received), (0, 2));
    }
}
