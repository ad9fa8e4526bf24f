//! Rust Ledger Engine Library
//! # Overview
//!
//! A monetary ledger core: per-account balances (available, reserved and
//! credit-limit backed) mutated by a fixed set of money-movement operations,
//! with per-account mutual exclusion and a batch dispatcher that returns one
//! response per request.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (Account, LedgerEntry, requests, responses, errors)
//! - [`core`] - Business logic components:
//!   - [`core::lock_registry`] - Per-account locks with canonical pair ordering
//!   - [`core::rules`] - Pure balance transitions
//!   - [`core::engine`] - The six operation handlers
//!   - [`core::dispatcher`] - Batch fan-out with bounded concurrency
//! - [`store`] - In-memory store collaborators and the retry decorator
//! - [`io`] - CSV request, account and response formats
//! - [`cli`] - CLI arguments parsing
//! - [`pipeline`] - File-to-file processing used by the binary
//!
//! # Operations
//!
//! - **Credit**: add to available balance
//! - **Debit**: spend available balance, then credit limit
//! - **Reserve**: hold available funds (credit limit not usable)
//! - **Capture**: release a hold back into available balance
//! - **Reversal**: invert a prior entry located by reference id
//! - **Transfer**: move available funds between two accounts
//!
//! # Outcomes
//!
//! Every request yields a response with status `success`, `failed` or
//! `rejected` (amount below one minor unit). Callers never receive an error.

// Module declarations
pub mod cli;
pub mod core;
pub mod io;
pub mod pipeline;
pub mod store;
pub mod telemetry;
pub mod types;

pub use core::{BatchDispatcher, DispatcherConfig, LedgerEngine, Traced};
pub use pipeline::{Pipeline, PipelineConfig, ReadConfig};
pub use store::{InMemoryAccountStore, InMemoryLedgerStore, Resilient, RetryPolicy};
pub use types::{
    Account, AccountId, AccountStatus, Command, EntryType, LedgerEntry, LedgerError, MinorUnits,
    Operation, ResponseStatus, StoreError, TransactionRequest, TransactionResponse,
};
