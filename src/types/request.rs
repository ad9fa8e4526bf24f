//! Request/response envelope exchanged with the batch entry point
//!
//! These are transport DTOs, not ledger records. `Balance` on a response is
//! always `available + reserved`.

use super::account::{Account, AccountId, MinorUnits};
use super::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Default currency carried on requests that do not name one
pub const DEFAULT_CURRENCY: &str = "BRL";

/// Money-movement operations understood by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Credit,
    Debit,
    Reserve,
    Capture,
    Reversal,
    Transfer,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Credit => "credit",
            Operation::Debit => "debit",
            Operation::Reserve => "reserve",
            Operation::Capture => "capture",
            Operation::Reversal => "reversal",
            Operation::Transfer => "transfer",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = LedgerError;

    /// Case-insensitive match; surrounding whitespace is ignored
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "credit" => Ok(Operation::Credit),
            "debit" => Ok(Operation::Debit),
            "reserve" => Ok(Operation::Reserve),
            "capture" => Ok(Operation::Capture),
            "reversal" => Ok(Operation::Reversal),
            "transfer" => Ok(Operation::Transfer),
            _ => Err(LedgerError::invalid_operation(s)),
        }
    }
}

/// One caller request as submitted to the batch entry point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRequest {
    pub account_id: AccountId,
    pub amount: MinorUnits,
    /// Operation name, matched case-insensitively
    pub operation: String,
    pub reference_id: String,
    pub target_account_id: Option<AccountId>,
    pub source_account_id: Option<AccountId>,
    /// Metadata only; no conversion happens
    pub currency: String,
    pub description: String,
}

impl TransactionRequest {
    /// Create a request with no transfer counterparties and an empty description
    pub fn new(
        account_id: impl Into<AccountId>,
        operation: impl Into<String>,
        amount: MinorUnits,
        reference_id: impl Into<String>,
    ) -> Self {
        TransactionRequest {
            account_id: account_id.into(),
            amount,
            operation: operation.into(),
            reference_id: reference_id.into(),
            target_account_id: None,
            source_account_id: None,
            currency: DEFAULT_CURRENCY.to_string(),
            description: String::new(),
        }
    }

    pub fn with_target(mut self, target_account_id: impl Into<AccountId>) -> Self {
        self.target_account_id = Some(target_account_id.into());
        self
    }

    pub fn with_source(mut self, source_account_id: impl Into<AccountId>) -> Self {
        self.source_account_id = Some(source_account_id.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Outcome classification of a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Failed,
    Rejected,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Success => "success",
            ResponseStatus::Failed => "failed",
            ResponseStatus::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One response per request; callers never receive an error instead
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub transaction_id: String,
    pub status: ResponseStatus,
    pub balance: MinorUnits,
    pub reserved_balance: MinorUnits,
    pub available_balance: MinorUnits,
    pub timestamp: DateTime<Utc>,
    pub error_message: Option<String>,
}

impl TransactionResponse {
    /// Successful outcome reporting the account's post-operation balances
    pub fn success(transaction_id: impl Into<String>, account: &Account) -> Self {
        TransactionResponse {
            transaction_id: transaction_id.into(),
            status: ResponseStatus::Success,
            balance: account.balance(),
            reserved_balance: account.reserved_balance,
            available_balance: account.available_balance,
            timestamp: Utc::now(),
            error_message: None,
        }
    }

    /// Failure with zeroed balances (storage errors, missing accounts, dispatch errors)
    pub fn failed(account_id: &str, message: impl Into<String>) -> Self {
        TransactionResponse {
            transaction_id: failed_id(account_id),
            status: ResponseStatus::Failed,
            balance: 0,
            reserved_balance: 0,
            available_balance: 0,
            timestamp: Utc::now(),
            error_message: Some(message.into()),
        }
    }

    /// Business-rule failure reporting the untouched balances of the account
    pub fn declined(account: &Account, message: impl Into<String>) -> Self {
        TransactionResponse {
            transaction_id: failed_id(&account.account_id),
            status: ResponseStatus::Failed,
            balance: account.balance(),
            reserved_balance: account.reserved_balance,
            available_balance: account.available_balance,
            timestamp: Utc::now(),
            error_message: Some(message.into()),
        }
    }

    /// Invalid client input; nothing was read or written
    pub fn rejected(account_id: &str, message: impl Into<String>) -> Self {
        TransactionResponse {
            transaction_id: format!("TXN-{}-REJECTED", account_id),
            status: ResponseStatus::Rejected,
            balance: 0,
            reserved_balance: 0,
            available_balance: 0,
            timestamp: Utc::now(),
            error_message: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success
    }
}

fn failed_id(account_id: &str) -> String {
    format!("TXN-{}-FAILED", account_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("credit", Operation::Credit)]
    #[case("DEBIT", Operation::Debit)]
    #[case("Reserve", Operation::Reserve)]
    #[case(" capture ", Operation::Capture)]
    #[case("reversal", Operation::Reversal)]
    #[case("TRANSFER", Operation::Transfer)]
    fn test_operation_parses_case_insensitively(#[case] input: &str, #[case] expected: Operation) {
        assert_eq!(input.parse::<Operation>().unwrap(), expected);
    }

    #[test]
    fn test_operation_rejects_unknown_name() {
        let err = "invalid-op".parse::<Operation>().unwrap_err();
        assert_eq!(err, LedgerError::invalid_operation("invalid-op"));
        assert!(err.to_string().contains("invalid-op"));
    }

    #[test]
    fn test_success_response_reports_balance_sum() {
        let account = Account::new("ACC-1", "C-1").with_balances(70, 30, 0);
        let response = TransactionResponse::success("TXN-000000001", &account);

        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(response.balance, 100);
        assert_eq!(response.available_balance, 70);
        assert_eq!(response.reserved_balance, 30);
        assert!(response.error_message.is_none());
    }

    #[test]
    fn test_failed_response_is_zeroed() {
        let response = TransactionResponse::failed("ACC-9", "account not found: ACC-9");

        assert_eq!(response.transaction_id, "TXN-ACC-9-FAILED");
        assert_eq!(response.status, ResponseStatus::Failed);
        assert_eq!(response.balance, 0);
        assert_eq!(response.available_balance, 0);
        assert_eq!(response.reserved_balance, 0);
    }

    #[test]
    fn test_rejected_response_id() {
        let response = TransactionResponse::rejected("ACC-1", "bad amount");
        assert_eq!(response.transaction_id, "TXN-ACC-1-REJECTED");
        assert_eq!(response.status, ResponseStatus::Rejected);
    }
}
