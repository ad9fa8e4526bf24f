//! Per-account mutual exclusion
//!
//! The `AccountLockRegistry` hands out one async mutex per account id, creating
//! it lazily on first use. Holding an [`AccountLock`] guarantees that no other
//! mutating operation runs against that account; the guard releases the lock
//! when dropped, on every exit path including task cancellation.
//!
//! # Two-account operations
//!
//! [`AccountLockRegistry::acquire_pair`] always locks the lexicographically
//! smaller id first. Two transfers in opposite directions between the same pair
//! of accounts therefore contend on the same first lock instead of each holding
//! one lock and waiting for the other.
//!
//! # Growth
//!
//! Locks are kept after release. [`AccountLockRegistry::evict_idle`] drops the
//! ones nobody holds or waits on, for deployments with an unbounded account set.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::types::AccountId;

/// Held lock on a single account
///
/// Released on drop. No FIFO fairness among waiters is promised.
#[derive(Debug)]
pub struct AccountLock {
    account_id: AccountId,
    _guard: OwnedMutexGuard<()>,
}

impl AccountLock {
    pub fn account_id(&self) -> &str {
        &self.account_id
    }
}

/// Registry of per-account locks
///
/// Injected into the engine and shared behind an `Arc`; two engines sharing one
/// registry serialize against each other as well.
#[derive(Debug, Default)]
pub struct AccountLockRegistry {
    locks: DashMap<AccountId, Arc<Mutex<()>>>,
}

impl AccountLockRegistry {
    pub fn new() -> Self {
        Self {
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, account_id: &str) -> Arc<Mutex<()>> {
        if let Some(existing) = self.locks.get(account_id) {
            return Arc::clone(existing.value());
        }
        Arc::clone(
            self.locks
                .entry(account_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        )
    }

    /// Wait until the account's lock is free and take it
    pub async fn acquire(&self, account_id: &str) -> AccountLock {
        let mutex = self.lock_for(account_id);
        AccountLock {
            account_id: account_id.to_string(),
            _guard: mutex.lock_owned().await,
        }
    }

    /// Take the locks of two distinct accounts in canonical order
    ///
    /// The returned guards are in argument order: `(first, second)`. Returns
    /// `None` without locking anything when both ids are equal, since the
    /// second acquisition would wait forever.
    pub async fn acquire_pair(
        &self,
        first: &str,
        second: &str,
    ) -> Option<(AccountLock, AccountLock)> {
        if first == second {
            return None;
        }

        if first < second {
            let a = self.acquire(first).await;
            let b = self.acquire(second).await;
            Some((a, b))
        } else {
            let b = self.acquire(second).await;
            let a = self.acquire(first).await;
            Some((a, b))
        }
    }

    /// Number of account locks currently retained
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Drop locks that are neither held nor awaited
    ///
    /// Returns the number of evicted locks. A lock whose `Arc` is shared is in
    /// use by an acquirer, so only uniquely owned entries are removed.
    pub fn evict_idle(&self) -> usize {
        let before = self.locks.len();
        self.locks.retain(|_, mutex| Arc::strong_count(mutex) > 1);
        before.saturating_sub(self.locks.len())
    }
}
