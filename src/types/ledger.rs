//! Ledger entry types
//!
//! A ledger entry is the immutable, append-only record of one balance-affecting
//! event. Entries are built by the handlers after the new account state has been
//! persisted and handed to the ledger store, which assigns the `entry_id`.

use super::account::{AccountId, MinorUnits};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ledger entry identifier
///
/// Assigned by the ledger store; doubles as the externally visible transaction id.
pub type EntryId = String;

/// Kind of balance-affecting event recorded by an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryType {
    Credit,
    Debit,
    Reserve,
    Capture,
    Reversal,
    Transfer,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Credit => "credit",
            EntryType::Debit => "debit",
            EntryType::Reserve => "reserve",
            EntryType::Capture => "capture",
            EntryType::Reversal => "reversal",
            EntryType::Transfer => "transfer",
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record of a balance-affecting event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// Store-assigned id; empty until the entry has been appended
    pub entry_id: EntryId,

    /// Account the event applied to
    pub account_id: AccountId,

    /// Event kind
    pub entry_type: EntryType,

    /// Positive amount in minor units
    pub amount: MinorUnits,

    /// Free-form description
    pub description: String,

    /// Caller correlation id
    ///
    /// For a reversal this is the reference of the entry being reversed.
    pub reference_id: Option<String>,

    /// Portion of a debit that was drawn from the credit limit
    ///
    /// Zero for every other entry type.
    pub credit_drawn: MinorUnits,
}

impl LedgerEntry {
    /// Build an entry that has not been appended yet
    pub fn new(
        account_id: impl Into<AccountId>,
        entry_type: EntryType,
        amount: MinorUnits,
        description: impl Into<String>,
        reference_id: Option<String>,
    ) -> Self {
        LedgerEntry {
            entry_id: EntryId::new(),
            account_id: account_id.into(),
            entry_type,
            amount,
            description: description.into(),
            reference_id,
            credit_drawn: 0,
        }
    }

    pub fn with_credit_drawn(mut self, credit_drawn: MinorUnits) -> Self {
        self.credit_drawn = credit_drawn;
        self
    }
}
