//! Core traits for the store collaborators and the handler seam
//!
//! The engine never talks to a concrete database. It consumes two narrow ports,
//! [`AccountStore`] and [`LedgerStore`], and exposes itself to the dispatcher
//! through [`OperationHandler`], which decorators (tracing, tests) can wrap.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::types::{
    Account, Command, EntryId, Interrupted, LedgerEntry, LedgerError, StoreError,
    TransactionResponse,
};

/// Account read/update contract
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Load the current state of an account
    ///
    /// Fails with `NotFound` for unknown ids, `Inactive` when the account's
    /// status forbids money movement, or a transient error.
    async fn get(&self, account_id: &str) -> Result<Account, StoreError>;

    /// Persist the full state of an account
    async fn update(&self, account: &Account) -> Result<(), StoreError>;
}

/// Append-only ledger contract
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Append an entry and return the id the store assigned to it
    async fn append(&self, entry: LedgerEntry) -> Result<EntryId, StoreError>;

    /// Find the earliest entry carrying `reference_id`
    async fn find_by_reference_id(
        &self,
        reference_id: &str,
    ) -> Result<Option<LedgerEntry>, StoreError>;
}

#[async_trait]
impl<T: AccountStore + ?Sized> AccountStore for Arc<T> {
    async fn get(&self, account_id: &str) -> Result<Account, StoreError> {
        (**self).get(account_id).await
    }

    async fn update(&self, account: &Account) -> Result<(), StoreError> {
        (**self).update(account).await
    }
}

#[async_trait]
impl<T: LedgerStore + ?Sized> LedgerStore for Arc<T> {
    async fn append(&self, entry: LedgerEntry) -> Result<EntryId, StoreError> {
        (**self).append(entry).await
    }

    async fn find_by_reference_id(
        &self,
        reference_id: &str,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        (**self).find_by_reference_id(reference_id).await
    }
}

/// A component able to execute one command and report its outcome
///
/// Implementations must never panic or return an error for business outcomes;
/// every result is expressed as a [`TransactionResponse`].
#[async_trait]
pub trait OperationHandler: Send + Sync {
    /// Execute `command`, giving up when `stop` fires only while nothing has
    /// been written yet
    ///
    /// Returns `Err(Interrupted)` if the handler stopped while waiting for a
    /// lock or reading. Once the first store write has begun the command runs
    /// to completion and its real outcome is returned, even if `stop` fired.
    async fn handle_until(
        &self,
        command: Command,
        stop: &CancellationToken,
    ) -> Result<TransactionResponse, Interrupted>;

    /// Execute `command` to completion
    async fn handle(&self, command: Command) -> TransactionResponse {
        let account_id = command.account_id().to_string();
        self.handle_until(command, &CancellationToken::new())
            .await
            .unwrap_or_else(|_| {
                TransactionResponse::failed(&account_id, LedgerError::Cancelled.to_string())
            })
    }
}
