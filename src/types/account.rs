//! Account-related types for the ledger engine
//!
//! This module defines the Account structure and the identifiers and
//! status values that travel with it.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Account identifier
///
/// Opaque string key assigned by the account store.
pub type AccountId = String;

/// Amount in minor currency units (e.g. cents)
pub type MinorUnits = i64;

/// Lifecycle status of an account
///
/// Status is enforced by the account store, never mutated by the handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    #[default]
    Active,
    Blocked,
    Closed,
}

impl fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccountStatus::Active => f.write_str("active"),
            AccountStatus::Blocked => f.write_str("blocked"),
            AccountStatus::Closed => f.write_str("closed"),
        }
    }
}

/// Account state as loaded from and persisted to the account store
///
/// All balances are in minor units.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Unique account identifier
    pub account_id: AccountId,

    /// Owning client reference (informational)
    pub client_id: String,

    /// Spendable funds not held by a reservation
    ///
    /// Never negative at rest.
    pub available_balance: MinorUnits,

    /// Funds held by reservations pending capture
    pub reserved_balance: MinorUnits,

    /// Remaining unused borrowing capacity
    ///
    /// Consumed by debits that exceed `available_balance`; only a reversal of
    /// the consuming debit gives it back.
    pub credit_limit: MinorUnits,

    /// Account status
    pub status: AccountStatus,
}

impl Account {
    /// Create an active account with zero balances and no credit limit
    pub fn new(account_id: impl Into<AccountId>, client_id: impl Into<String>) -> Self {
        Account {
            account_id: account_id.into(),
            client_id: client_id.into(),
            available_balance: 0,
            reserved_balance: 0,
            credit_limit: 0,
            status: AccountStatus::Active,
        }
    }

    /// Builder-style helper setting the opening balances
    pub fn with_balances(
        mut self,
        available_balance: MinorUnits,
        reserved_balance: MinorUnits,
        credit_limit: MinorUnits,
    ) -> Self {
        self.available_balance = available_balance;
        self.reserved_balance = reserved_balance;
        self.credit_limit = credit_limit;
        self
    }

    /// Total balance reported to callers: available + reserved
    pub fn balance(&self) -> MinorUnits {
        self.available_balance.saturating_add(self.reserved_balance)
    }

    /// Total spendable capacity: available + credit limit
    pub fn spendable_capacity(&self) -> MinorUnits {
        self.available_balance.saturating_add(self.credit_limit)
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }
}
