//! In-memory store collaborators
//!
//! Concurrent, process-local implementations of [`AccountStore`] and
//! [`LedgerStore`] backed by `DashMap`. The binary seeds them from CSV and the
//! test suites use them as the reference collaborators.
//!
//! # Thread Safety
//!
//! Both stores are `Send + Sync` and use `DashMap`'s sharded locking; they
//! do not serialize money movement themselves. Mutual exclusion per account is
//! the lock registry's job, the store only has to keep each call atomic.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::core::traits::{AccountStore, LedgerStore};
use crate::types::{Account, EntryId, LedgerEntry, StoreError};

/// Account table keyed by account id
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    accounts: DashMap<String, Account>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
        }
    }

    /// Build a store pre-populated with `accounts`
    pub fn with_accounts(accounts: impl IntoIterator<Item = Account>) -> Self {
        let store = Self::new();
        for account in accounts {
            store.insert(account);
        }
        store
    }

    /// Insert or replace an account
    pub fn insert(&self, account: Account) {
        self.accounts.insert(account.account_id.clone(), account);
    }

    /// Current state of an account regardless of its status
    pub fn snapshot(&self, account_id: &str) -> Option<Account> {
        self.accounts
            .get(account_id)
            .map(|entry| entry.value().clone())
    }

    /// All accounts, sorted by account id for deterministic output
    pub fn all_accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by(|a, b| a.account_id.cmp(&b.account_id));
        accounts
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }
}

#[async_trait]
impl AccountStore for InMemoryAccountStore {
    async fn get(&self, account_id: &str) -> Result<Account, StoreError> {
        let account = self
            .snapshot(account_id)
            .ok_or_else(|| StoreError::not_found(account_id))?;

        if !account.is_active() {
            return Err(StoreError::Inactive {
                account_id: account.account_id,
                status: account.status,
            });
        }

        Ok(account)
    }

    async fn update(&self, account: &Account) -> Result<(), StoreError> {
        match self.accounts.get_mut(&account.account_id) {
            Some(mut existing) => {
                *existing.value_mut() = account.clone();
                Ok(())
            }
            None => Err(StoreError::not_found(&account.account_id)),
        }
    }
}

/// Append-only ledger with store-assigned ids
///
/// Ids have the form `TXN-<9-digit sequence>`, so lexicographic order matches
/// append order. The reference index keeps the first entry appended for each
/// reference id.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    entries: DashMap<EntryId, LedgerEntry>,
    by_reference: DashMap<String, EntryId>,
    sequence: AtomicU64,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
            by_reference: DashMap::new(),
            sequence: AtomicU64::new(0),
        }
    }

    fn next_id(&self) -> EntryId {
        let next = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        format!("TXN-{:09}", next)
    }

    pub fn get(&self, entry_id: &str) -> Option<LedgerEntry> {
        self.entries.get(entry_id).map(|entry| entry.value().clone())
    }

    /// All entries in append order
    pub fn entries(&self) -> Vec<LedgerEntry> {
        let mut entries: Vec<LedgerEntry> = self
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        entries.sort_by(|a, b| a.entry_id.cmp(&b.entry_id));
        entries
    }

    /// Entries recorded against one account, in append order
    pub fn entries_for(&self, account_id: &str) -> Vec<LedgerEntry> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.account_id == account_id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn append(&self, mut entry: LedgerEntry) -> Result<EntryId, StoreError> {
        let entry_id = self.next_id();
        entry.entry_id = entry_id.clone();

        let reference_id = entry.reference_id.clone();
        self.entries.insert(entry_id.clone(), entry);

        if let Some(reference_id) = reference_id {
            // First occurrence wins
            self.by_reference
                .entry(reference_id)
                .or_insert_with(|| entry_id.clone());
        }

        Ok(entry_id)
    }

    async fn find_by_reference_id(
        &self,
        reference_id: &str,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        let Some(entry_id) = self
            .by_reference
            .get(reference_id)
            .map(|id| id.value().clone())
        else {
            return Ok(None);
        };
        Ok(self.get(&entry_id))
    }
}
