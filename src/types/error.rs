//! Error types for the ledger engine
//!
//! Two layers of errors exist:
//!
//! - [`StoreError`]: raised by the account and ledger store collaborators
//!   (missing or inactive accounts, transient failures, call timeouts).
//! - [`LedgerError`]: business-rule and dispatch failures raised by the core,
//!   wrapping any `StoreError` that reached a handler.
//!
//! Neither type ever reaches a caller of the batch entry point. Handlers turn
//! every `LedgerError` into a `failed` or `rejected` response whose message is
//! the error's `Display` text.

use super::account::{AccountId, AccountStatus, MinorUnits};
use super::ledger::EntryType;
use super::request::Operation;
use thiserror::Error;

/// Errors surfaced by store collaborators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// No account with this id exists
    #[error("account not found: {account_id}")]
    NotFound { account_id: AccountId },

    /// Account exists but its status forbids money movement
    #[error("account {account_id} is {status}")]
    Inactive {
        account_id: AccountId,
        status: AccountStatus,
    },

    /// Temporary storage failure; safe to retry
    #[error("transient storage error: {message}")]
    Transient { message: String },

    /// A single store call exceeded its deadline
    #[error("storage call '{operation}' timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },
}

impl StoreError {
    /// Whether the retry policy may attempt the call again
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient { .. } | StoreError::Timeout { .. })
    }

    pub fn not_found(account_id: &str) -> Self {
        StoreError::NotFound {
            account_id: account_id.to_string(),
        }
    }

    pub fn transient(message: impl Into<String>) -> Self {
        StoreError::Transient {
            message: message.into(),
        }
    }
}

/// Business-rule and dispatch failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// Amount below one minor unit; the only rejection
    #[error("{operation} amount must be at least 1 minor unit (amount >= 1)")]
    InvalidAmount { operation: Operation },

    /// Operation string did not match any handler
    #[error("invalid operation: {operation}")]
    InvalidOperation { operation: String },

    #[error("transfer requires a target account")]
    MissingTargetAccount,

    #[error("transfer source and target must differ: {account_id}")]
    SelfTransfer { account_id: AccountId },

    /// Debit exceeds available balance plus credit limit
    #[error("insufficient balance considering credit limit for account {account_id}: capacity {capacity}, requested {requested}")]
    InsufficientBalance {
        account_id: AccountId,
        capacity: MinorUnits,
        requested: MinorUnits,
    },

    /// Reserve or transfer exceeds available balance (credit limit not usable)
    #[error("insufficient available balance for {operation} on account {account_id}: available {available}, requested {requested}")]
    InsufficientAvailableBalance {
        account_id: AccountId,
        operation: Operation,
        available: MinorUnits,
        requested: MinorUnits,
    },

    #[error("insufficient reserved balance for capture on account {account_id}: reserved {reserved}, requested {requested}")]
    InsufficientReservedBalance {
        account_id: AccountId,
        reserved: MinorUnits,
        requested: MinorUnits,
    },

    /// No ledger entry carries the reference a reversal points at
    #[error("original not found for reference '{reference_id}'")]
    OriginalNotFound { reference_id: String },

    #[error("insufficient balance to reverse {entry_type} on account {account_id}: balance {balance}, required {required}")]
    InsufficientBalanceToReverse {
        account_id: AccountId,
        entry_type: EntryType,
        balance: MinorUnits,
        required: MinorUnits,
    },

    #[error("unsupported original type for reversal: {entry_type}")]
    UnsupportedReversal { entry_type: EntryType },

    #[error("source account not found: {account_id}")]
    SourceAccountNotFound { account_id: AccountId },

    #[error("target account not found: {account_id}")]
    TargetAccountNotFound { account_id: AccountId },

    #[error("arithmetic overflow in {operation} for account {account_id}")]
    ArithmeticOverflow {
        operation: Operation,
        account_id: AccountId,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("operation timed out after {after_ms}ms")]
    TimedOut { after_ms: u64 },

    /// The task running the operation panicked or was aborted
    #[error("operation aborted unexpectedly: {message}")]
    Aborted { message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A handler stopped at a safe point, before writing any store state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation interrupted before any write")]
pub struct Interrupted;

// Helper functions for creating common errors

impl LedgerError {
    /// Whether the error classifies as `rejected` rather than `failed`
    pub fn is_rejection(&self) -> bool {
        matches!(self, LedgerError::InvalidAmount { .. })
    }

    /// Whether the error is a business-rule violation detected on a loaded account
    ///
    /// Such failures report the account's untouched balances instead of zeros.
    pub fn is_rule_violation(&self) -> bool {
        matches!(
            self,
            LedgerError::InsufficientBalance { .. }
                | LedgerError::InsufficientAvailableBalance { .. }
                | LedgerError::InsufficientReservedBalance { .. }
                | LedgerError::InsufficientBalanceToReverse { .. }
                | LedgerError::UnsupportedReversal { .. }
                | LedgerError::ArithmeticOverflow { .. }
        )
    }

    pub fn invalid_amount(operation: Operation) -> Self {
        LedgerError::InvalidAmount { operation }
    }

    pub fn invalid_operation(operation: &str) -> Self {
        LedgerError::InvalidOperation {
            operation: operation.to_string(),
        }
    }

    pub fn arithmetic_overflow(operation: Operation, account_id: &str) -> Self {
        LedgerError::ArithmeticOverflow {
            operation,
            account_id: account_id.to_string(),
        }
    }

    pub fn original_not_found(reference_id: &str) -> Self {
        LedgerError::OriginalNotFound {
            reference_id: reference_id.to_string(),
        }
    }
}
