//! Core business logic module
//!
//! This module contains the ledger processing components:
//! - `traits` - Store collaborator ports and the handler seam
//! - `lock_registry` - Per-account mutual exclusion
//! - `rules` - Pure balance transitions
//! - `engine` - The six operation handlers
//! - `middleware` - Tracing decorator around handlers
//! - `dispatcher` - Batch fan-out with bounded concurrency

pub mod dispatcher;
pub mod engine;
pub mod lock_registry;
pub mod middleware;
pub mod rules;
pub mod traits;

pub use dispatcher::{BatchDispatcher, DispatcherConfig};
pub use engine::LedgerEngine;
pub use lock_registry::{AccountLock, AccountLockRegistry};
pub use middleware::Traced;
pub use traits::{AccountStore, LedgerStore, OperationHandler};
