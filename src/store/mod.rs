//! Store collaborators
//!
//! - `memory` - In-memory account and ledger stores
//! - `retry` - Exponential backoff decorator for any store

pub mod memory;
pub mod retry;

pub use memory::{InMemoryAccountStore, InMemoryLedgerStore};
pub use retry::{Resilient, RetryPolicy};
