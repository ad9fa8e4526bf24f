//! Operation handlers
//!
//! The `LedgerEngine` executes the six money-movement operations. Every handler
//! follows the same shape:
//!
//! 1. Validate the amount (`< 1` is `rejected`, nothing else happens)
//! 2. Acquire the account lock(s) from the registry
//! 3. Load the account(s) and apply the balance rule from [`rules`]
//! 4. Persist the new state, then append the ledger entry
//! 5. Release the lock(s) and report the outcome
//!
//! No handler returns an error. Business-rule violations become `failed`
//! responses carrying the account's untouched balances; store failures become
//! `failed` responses with zeroed balances.
//!
//! If the ledger append fails after the account was persisted, the pre-operation
//! snapshot is written back so the balance change never outlives a missing
//! entry. Transfers do the same when the target update fails.
//!
//! # Stopping
//!
//! Through [`OperationHandler::handle_until`] a handler can be asked to stop.
//! It honors the request only while waiting for locks or reading. From the
//! first write on it runs to completion, compensation included, and reports
//! what actually happened.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::lock_registry::AccountLockRegistry;
use crate::core::rules::{self, Effect};
use crate::core::traits::{AccountStore, LedgerStore, OperationHandler};
use crate::types::{
    Account, Command, EntryId, EntryType, Interrupted, LedgerEntry, LedgerError, MinorUnits,
    Movement, Operation, StoreError, TransactionResponse, TransferOrder,
};

/// Smallest amount accepted by any handler, in minor units
pub const MIN_AMOUNT: MinorUnits = 1;

/// Separator between the two entry ids of a transfer's transaction id
pub const TRANSFER_ID_SEPARATOR: char = '|';

type Rule = fn(&mut Account, MinorUnits) -> Result<Effect, LedgerError>;

/// Failure raised inside a critical section
#[derive(Debug)]
struct Failure {
    error: LedgerError,
    /// Untouched state of the account a rule was checked against
    account: Option<Account>,
}

impl Failure {
    fn declined(error: LedgerError, account: &Account) -> Self {
        Self {
            error,
            account: Some(account.clone()),
        }
    }

    fn into_response(self, account_id: &str) -> TransactionResponse {
        let message = self.error.to_string();
        match self.account {
            Some(account) if self.error.is_rule_violation() => {
                TransactionResponse::declined(&account, message)
            }
            _ => TransactionResponse::failed(account_id, message),
        }
    }
}

impl From<LedgerError> for Failure {
    fn from(error: LedgerError) -> Self {
        Self {
            error,
            account: None,
        }
    }
}

impl From<StoreError> for Failure {
    fn from(error: StoreError) -> Self {
        LedgerError::from(error).into()
    }
}

fn validate_amount(operation: Operation, amount: MinorUnits) -> Result<(), LedgerError> {
    if amount < MIN_AMOUNT {
        return Err(LedgerError::invalid_amount(operation));
    }
    Ok(())
}

/// Await `work` unless `stop` fires first
///
/// Only for lock waits and reads: dropping `work` midway must leave no trace.
async fn unless_stopped<T>(
    stop: &CancellationToken,
    work: impl Future<Output = T>,
) -> Result<T, Interrupted> {
    tokio::select! {
        biased;

        _ = stop.cancelled() => Err(Interrupted),
        output = work => Ok(output),
    }
}

/// Ledger core executing commands against the store collaborators
///
/// Cheap to share: all state lives behind `Arc`s, so the dispatcher hands one
/// engine to every worker.
pub struct LedgerEngine {
    accounts: Arc<dyn AccountStore>,
    ledger: Arc<dyn LedgerStore>,
    locks: Arc<AccountLockRegistry>,
}

impl LedgerEngine {
    /// Create an engine with its own lock registry
    pub fn new(accounts: Arc<dyn AccountStore>, ledger: Arc<dyn LedgerStore>) -> Self {
        Self::with_lock_registry(accounts, ledger, Arc::new(AccountLockRegistry::new()))
    }

    /// Create an engine serializing through a shared lock registry
    pub fn with_lock_registry(
        accounts: Arc<dyn AccountStore>,
        ledger: Arc<dyn LedgerStore>,
        locks: Arc<AccountLockRegistry>,
    ) -> Self {
        Self {
            accounts,
            ledger,
            locks,
        }
    }

    pub fn lock_registry(&self) -> &Arc<AccountLockRegistry> {
        &self.locks
    }

    pub async fn credit(&self, movement: Movement) -> TransactionResponse {
        self.handle(Command::Credit(movement)).await
    }

    /// Debit available balance, drawing on the credit limit for any shortfall
    pub async fn debit(&self, movement: Movement) -> TransactionResponse {
        self.handle(Command::Debit(movement)).await
    }

    pub async fn reserve(&self, movement: Movement) -> TransactionResponse {
        self.handle(Command::Reserve(movement)).await
    }

    pub async fn capture(&self, movement: Movement) -> TransactionResponse {
        self.handle(Command::Capture(movement)).await
    }

    /// Undo the ledger entry referenced by `movement.reference_id`
    ///
    /// The original is looked up by reference id and inverted according to its
    /// type, using the original amount. The new `Reversal` entry carries the
    /// same reference id, so a later reversal with that reference resolves to
    /// the original again; it is not replay-protected.
    pub async fn reversal(&self, movement: Movement) -> TransactionResponse {
        self.handle(Command::Reversal(movement)).await
    }

    /// Move available balance from one account to another
    ///
    /// Both locks are taken in canonical order before either account is read.
    /// The transaction id is the source and target entry ids joined by
    /// [`TRANSFER_ID_SEPARATOR`]; balances reported are the source's.
    pub async fn transfer(&self, order: TransferOrder) -> TransactionResponse {
        self.handle(Command::Transfer(order)).await
    }

    async fn apply(
        &self,
        operation: Operation,
        entry_type: EntryType,
        movement: Movement,
        rule: Rule,
        stop: &CancellationToken,
    ) -> Result<TransactionResponse, Interrupted> {
        if let Err(error) = validate_amount(operation, movement.amount) {
            return Ok(TransactionResponse::rejected(
                &movement.account_id,
                error.to_string(),
            ));
        }

        let _lock = unless_stopped(stop, self.locks.acquire(&movement.account_id)).await?;
        let loaded = unless_stopped(stop, self.accounts.get(&movement.account_id)).await?;

        let outcome = match loaded {
            Ok(before) => self.apply_locked(entry_type, &movement, rule, before).await,
            Err(error) => Err(error.into()),
        };
        Ok(match outcome {
            Ok((entry_id, account)) => TransactionResponse::success(entry_id, &account),
            Err(failure) => failure.into_response(&movement.account_id),
        })
    }

    async fn apply_locked(
        &self,
        entry_type: EntryType,
        movement: &Movement,
        rule: Rule,
        before: Account,
    ) -> Result<(EntryId, Account), Failure> {
        let mut account = before.clone();
        let effect = rule(&mut account, movement.amount)
            .map_err(|error| Failure::declined(error, &before))?;

        let entry = LedgerEntry::new(
            movement.account_id.as_str(),
            entry_type,
            movement.amount,
            movement.description.as_str(),
            movement.reference_id.clone(),
        )
        .with_credit_drawn(effect.credit_drawn);

        let entry_id = self.persist(&before, &account, entry).await?;
        Ok((entry_id, account))
    }

    async fn reverse(
        &self,
        movement: Movement,
        stop: &CancellationToken,
    ) -> Result<TransactionResponse, Interrupted> {
        if let Err(error) = validate_amount(Operation::Reversal, movement.amount) {
            return Ok(TransactionResponse::rejected(
                &movement.account_id,
                error.to_string(),
            ));
        }

        let _lock = unless_stopped(stop, self.locks.acquire(&movement.account_id)).await?;
        let loaded = unless_stopped(stop, self.load_reversal(&movement)).await?;

        let outcome = match loaded {
            Ok((original, before)) => self.reverse_locked(&movement, original, before).await,
            Err(failure) => Err(failure),
        };
        Ok(match outcome {
            Ok((entry_id, account)) => TransactionResponse::success(entry_id, &account),
            Err(failure) => failure.into_response(&movement.account_id),
        })
    }

    /// Resolve the original entry, then load the account
    async fn load_reversal(&self, movement: &Movement) -> Result<(LedgerEntry, Account), Failure> {
        let reference_id = movement.reference_id.as_deref().unwrap_or_default();
        let original = if reference_id.is_empty() {
            None
        } else {
            self.ledger.find_by_reference_id(reference_id).await?
        };
        let original = original.ok_or_else(|| LedgerError::original_not_found(reference_id))?;

        let before = self.accounts.get(&movement.account_id).await?;
        Ok((original, before))
    }

    async fn reverse_locked(
        &self,
        movement: &Movement,
        original: LedgerEntry,
        before: Account,
    ) -> Result<(EntryId, Account), Failure> {
        let mut account = before.clone();
        rules::reverse(&mut account, &original)
            .map_err(|error| Failure::declined(error, &before))?;

        let entry = LedgerEntry::new(
            movement.account_id.as_str(),
            EntryType::Reversal,
            original.amount,
            movement.description.as_str(),
            movement.reference_id.clone(),
        );

        let entry_id = self.persist(&before, &account, entry).await?;
        Ok((entry_id, account))
    }

    async fn move_funds(
        &self,
        order: TransferOrder,
        stop: &CancellationToken,
    ) -> Result<TransactionResponse, Interrupted> {
        let source_id = order.source_account_id.as_str();
        if let Err(error) = validate_amount(Operation::Transfer, order.amount) {
            return Ok(TransactionResponse::rejected(source_id, error.to_string()));
        }

        let locking = self.locks.acquire_pair(source_id, &order.target_account_id);
        let Some(_locks) = unless_stopped(stop, locking).await? else {
            let error = LedgerError::SelfTransfer {
                account_id: source_id.to_string(),
            };
            return Ok(TransactionResponse::failed(source_id, error.to_string()));
        };
        let loaded = unless_stopped(stop, self.load_transfer(&order)).await?;

        let outcome = match loaded {
            Ok((source_before, target_before)) => {
                self.transfer_locked(&order, source_before, target_before)
                    .await
            }
            Err(failure) => Err(failure),
        };
        Ok(match outcome {
            Ok((transaction_id, source)) => TransactionResponse::success(transaction_id, &source),
            Err(failure) => failure.into_response(source_id),
        })
    }

    async fn load_transfer(&self, order: &TransferOrder) -> Result<(Account, Account), Failure> {
        let source_before = self
            .accounts
            .get(&order.source_account_id)
            .await
            .map_err(|error| match error {
                StoreError::NotFound { account_id } => {
                    LedgerError::SourceAccountNotFound { account_id }
                }
                other => other.into(),
            })?;
        let target_before = self
            .accounts
            .get(&order.target_account_id)
            .await
            .map_err(|error| match error {
                StoreError::NotFound { account_id } => {
                    LedgerError::TargetAccountNotFound { account_id }
                }
                other => other.into(),
            })?;
        Ok((source_before, target_before))
    }

    async fn transfer_locked(
        &self,
        order: &TransferOrder,
        source_before: Account,
        target_before: Account,
    ) -> Result<(String, Account), Failure> {
        let mut source = source_before.clone();
        let mut target = target_before.clone();
        rules::transfer(&mut source, &mut target, order.amount)
            .map_err(|error| Failure::declined(error, &source_before))?;

        self.accounts.update(&source).await?;
        if let Err(error) = self.accounts.update(&target).await {
            self.restore(&source_before).await;
            return Err(error.into());
        }

        let outgoing = LedgerEntry::new(
            source.account_id.as_str(),
            EntryType::Transfer,
            order.amount,
            format!("transfer to {}: {}", target.account_id, order.description),
            order.reference_id.clone(),
        );
        let incoming = LedgerEntry::new(
            target.account_id.as_str(),
            EntryType::Transfer,
            order.amount,
            format!("transfer received from {}: {}", source.account_id, order.description),
            order.reference_id.clone(),
        );

        let appended = match self.ledger.append(outgoing).await {
            Ok(source_entry) => self
                .ledger
                .append(incoming)
                .await
                .map(|target_entry| (source_entry, target_entry)),
            Err(error) => Err(error),
        };

        match appended {
            Ok((source_entry, target_entry)) => Ok((
                format!("{}{}{}", source_entry, TRANSFER_ID_SEPARATOR, target_entry),
                source,
            )),
            Err(error) => {
                self.restore(&source_before).await;
                self.restore(&target_before).await;
                Err(error.into())
            }
        }
    }

    /// Persist `after`, then append `entry`; roll back to `before` if the append fails
    async fn persist(
        &self,
        before: &Account,
        after: &Account,
        entry: LedgerEntry,
    ) -> Result<EntryId, StoreError> {
        self.accounts.update(after).await?;

        match self.ledger.append(entry).await {
            Ok(entry_id) => Ok(entry_id),
            Err(error) => {
                self.restore(before).await;
                Err(error)
            }
        }
    }

    async fn restore(&self, snapshot: &Account) {
        if let Err(error) = self.accounts.update(snapshot).await {
            tracing::error!(
                account_id = %snapshot.account_id,
                %error,
                "failed to restore account snapshot"
            );
        }
    }
}

#[async_trait]
impl OperationHandler for LedgerEngine {
    async fn handle_until(
        &self,
        command: Command,
        stop: &CancellationToken,
    ) -> Result<TransactionResponse, Interrupted> {
        match command {
            Command::Credit(movement) => {
                self.apply(Operation::Credit, EntryType::Credit, movement, rules::credit, stop)
                    .await
            }
            Command::Debit(movement) => {
                self.apply(Operation::Debit, EntryType::Debit, movement, rules::debit, stop)
                    .await
            }
            Command::Reserve(movement) => {
                self.apply(Operation::Reserve, EntryType::Reserve, movement, rules::reserve, stop)
                    .await
            }
            Command::Capture(movement) => {
                self.apply(Operation::Capture, EntryType::Capture, movement, rules::capture, stop)
                    .await
            }
            Command::Reversal(movement) => self.reverse(movement, stop).await,
            Command::Transfer(order) => self.move_funds(order, stop).await,
        }
    }
}
