//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Account state, status and identifiers
//! - `ledger`: Append-only ledger entries
//! - `request`: Request/response envelope for the batch entry point
//! - `command`: Typed commands dispatched to the handlers
//! - `error`: Error types for the ledger engine

pub mod account;
pub mod command;
pub mod error;
pub mod ledger;
pub mod request;

pub use account::{Account, AccountId, AccountStatus, MinorUnits};
pub use command::{Command, Movement, TransferOrder};
pub use error::{Interrupted, LedgerError, StoreError};
pub use ledger::{EntryId, EntryType, LedgerEntry};
pub use request::{
    Operation, ResponseStatus, TransactionRequest, TransactionResponse, DEFAULT_CURRENCY,
};
