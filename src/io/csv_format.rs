//! CSV format handling for requests, account seeds and outputs
//!
//! This module centralizes all CSV format concerns, providing:
//! - `RequestRecord` and its conversion into a [`TransactionRequest`]
//! - `AccountRecord` and its conversion into an [`Account`]
//! - Response and account output serialization
//!
//! All functions are pure (no file I/O) for easy testing.

use crate::types::{
    Account, AccountStatus, MinorUnits, TransactionRequest, TransactionResponse,
    DEFAULT_CURRENCY,
};
use chrono::SecondsFormat;
use serde::Deserialize;
use std::io::Write;
use thiserror::Error;

/// Request CSV row
///
/// Columns: `account_id, operation, amount, reference_id, target_account_id,
/// source_account_id, currency, description`. Everything after `amount` is
/// optional.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct RequestRecord {
    pub account_id: String,
    pub operation: String,
    pub amount: Option<String>,
    pub reference_id: Option<String>,
    pub target_account_id: Option<String>,
    pub source_account_id: Option<String>,
    pub currency: Option<String>,
    pub description: Option<String>,
}

/// Account seed CSV row
///
/// Columns: `account_id, client_id, available_balance, reserved_balance,
/// credit_limit, status`. Missing balances default to zero, a missing status
/// to `active`.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct AccountRecord {
    pub account_id: String,
    pub client_id: Option<String>,
    pub available_balance: Option<MinorUnits>,
    pub reserved_balance: Option<MinorUnits>,
    pub credit_limit: Option<MinorUnits>,
    pub status: Option<String>,
}

/// Why a request row could not become a [`TransactionRequest`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestRowError {
    #[error("missing account_id for '{operation}' request")]
    MissingAccount { operation: String },

    #[error("'{operation}' request for account {account_id} requires an amount")]
    MissingAmount {
        account_id: String,
        operation: String,
    },

    #[error("invalid amount '{raw}' for account {account_id}: expected whole minor units")]
    InvalidAmount { account_id: String, raw: String },
}

impl RequestRowError {
    /// `rejected` response for a row that names its account
    ///
    /// `None` when the row has no account id to report under.
    pub fn to_response(&self) -> Option<TransactionResponse> {
        match self {
            RequestRowError::MissingAccount { .. } => None,
            RequestRowError::MissingAmount { account_id, .. }
            | RequestRowError::InvalidAmount { account_id, .. } => {
                Some(TransactionResponse::rejected(account_id, self.to_string()))
            }
        }
    }
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Convert a RequestRecord to a TransactionRequest
///
/// Only the row shape is checked here. The operation name and the amount's
/// sign are left to the dispatcher and the handlers, so such requests still
/// produce a `failed` or `rejected` response instead of being dropped.
///
/// # Errors
///
/// Fails when the account id is blank or the amount is missing or not an
/// integer number of minor units.
pub fn convert_request_record(record: RequestRecord) -> Result<TransactionRequest, RequestRowError> {
    if record.account_id.trim().is_empty() {
        return Err(RequestRowError::MissingAccount {
            operation: record.operation,
        });
    }

    let amount = match present(record.amount) {
        Some(raw) => match raw.trim().parse::<MinorUnits>() {
            Ok(amount) => amount,
            Err(_) => {
                return Err(RequestRowError::InvalidAmount {
                    account_id: record.account_id,
                    raw,
                })
            }
        },
        None => {
            return Err(RequestRowError::MissingAmount {
                account_id: record.account_id,
                operation: record.operation,
            })
        }
    };

    let mut request = TransactionRequest::new(
        record.account_id,
        record.operation,
        amount,
        record.reference_id.unwrap_or_default(),
    );
    request.target_account_id = present(record.target_account_id);
    request.source_account_id = present(record.source_account_id);
    request.currency = present(record.currency).unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
    request.description = record.description.unwrap_or_default();

    Ok(request)
}

fn parse_status(raw: &str) -> Option<AccountStatus> {
    match raw.trim().to_lowercase().as_str() {
        "active" => Some(AccountStatus::Active),
        "blocked" => Some(AccountStatus::Blocked),
        "closed" => Some(AccountStatus::Closed),
        _ => None,
    }
}

/// Convert an AccountRecord to an Account
///
/// # Errors
///
/// Returns a message for a blank account id, negative balances or an unknown
/// status.
pub fn convert_account_record(record: AccountRecord) -> Result<Account, String> {
    if record.account_id.trim().is_empty() {
        return Err("Missing account_id in account record".to_string());
    }

    let available = record.available_balance.unwrap_or_default();
    let reserved = record.reserved_balance.unwrap_or_default();
    let credit_limit = record.credit_limit.unwrap_or_default();
    if available < 0 || reserved < 0 || credit_limit < 0 {
        return Err(format!(
            "Negative balance for account {}",
            record.account_id
        ));
    }

    let status = match present(record.status) {
        Some(raw) => parse_status(&raw).ok_or_else(|| {
            format!("Invalid status '{}' for account {}", raw, record.account_id)
        })?,
        None => AccountStatus::Active,
    };

    let mut account = Account::new(record.account_id, record.client_id.unwrap_or_default())
        .with_balances(available, reserved, credit_limit);
    account.status = status;
    Ok(account)
}

/// Write responses to CSV format
///
/// Columns: transaction_id, status, balance, reserved_balance,
/// available_balance, timestamp, error_message. Rows are written in the
/// order given; the dispatcher already sorts them.
pub fn write_responses_csv(
    responses: &[TransactionResponse],
    output: &mut dyn Write,
) -> Result<(), String> {
    let mut writer = csv::Writer::from_writer(output);

    writer
        .write_record([
            "transaction_id",
            "status",
            "balance",
            "reserved_balance",
            "available_balance",
            "timestamp",
            "error_message",
        ])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    for response in responses {
        writer
            .write_record([
                response.transaction_id.clone(),
                response.status.to_string(),
                response.balance.to_string(),
                response.reserved_balance.to_string(),
                response.available_balance.to_string(),
                response
                    .timestamp
                    .to_rfc3339_opts(SecondsFormat::Millis, true),
                response.error_message.clone().unwrap_or_default(),
            ])
            .map_err(|e| format!("Failed to write response record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

/// Write account states to CSV format
///
/// Same columns as the account seed file, so the output of one run can seed
/// the next. Accounts are sorted by account id for deterministic output.
pub fn write_accounts_csv(accounts: &[Account], output: &mut dyn Write) -> Result<(), String> {
    let mut writer = csv::Writer::from_writer(output);

    writer
        .write_record([
            "account_id",
            "client_id",
            "available_balance",
            "reserved_balance",
            "credit_limit",
            "status",
        ])
        .map_err(|e| format!("Failed to write CSV header: {}", e))?;

    let mut sorted_accounts = accounts.to_vec();
    sorted_accounts.sort_by(|a, b| a.account_id.cmp(&b.account_id));

    for account in sorted_accounts {
        writer
            .write_record([
                account.account_id.clone(),
                account.client_id.clone(),
                account.available_balance.to_string(),
                account.reserved_balance.to_string(),
                account.credit_limit.to_string(),
                account.status.to_string(),
            ])
            .map_err(|e| format!("Failed to write account record: {}", e))?;
    }

    writer
        .flush()
        .map_err(|e| format!("Failed to flush output: {}", e))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ResponseStatus;
    use chrono::{TimeZone, Utc};
    use rstest::rstest;

    fn request_record(operation: &str, amount: Option<&str>) -> RequestRecord {
        RequestRecord {
            account_id: "ACC-1".to_string(),
            operation: operation.to_string(),
            amount: amount.map(|s| s.to_string()),
            reference_id: Some("REF-1".to_string()),
            target_account_id: None,
            source_account_id: None,
            currency: None,
            description: None,
        }
    }

    fn account_record(status: Option<&str>) -> AccountRecord {
        AccountRecord {
            account_id: "ACC-1".to_string(),
            client_id: Some("CLI-1".to_string()),
            available_balance: Some(100),
            reserved_balance: None,
            credit_limit: Some(50),
            status: status.map(|s| s.to_string()),
        }
    }

    #[rstest]
    #[case("credit", "1000", 1000)]
    #[case("DEBIT", " 250 ", 250)]
    #[case("invalid-op", "100", 100)]
    #[case("credit", "0", 0)]
    #[case("debit", "-5", -5)]
    fn test_convert_request_record_valid(
        #[case] operation: &str,
        #[case] amount: &str,
        #[case] expected: MinorUnits,
    ) {
        let request = convert_request_record(request_record(operation, Some(amount))).unwrap();

        assert_eq!(request.account_id, "ACC-1");
        assert_eq!(request.operation, operation);
        assert_eq!(request.amount, expected);
        assert_eq!(request.reference_id, "REF-1");
        assert_eq!(request.currency, DEFAULT_CURRENCY);
    }

    #[rstest]
    #[case::missing_amount(None, "'credit' request for account ACC-1 requires an amount")]
    #[case::empty_amount(Some(""), "'credit' request for account ACC-1 requires an amount")]
    #[case::decimal_amount(
        Some("10.50"),
        "invalid amount '10.50' for account ACC-1: expected whole minor units"
    )]
    #[case::text_amount(Some("ten"), "invalid amount 'ten' for account ACC-1: expected whole minor units")]
    fn test_convert_request_record_errors(#[case] amount: Option<&str>, #[case] expected: &str) {
        let err = convert_request_record(request_record("credit", amount)).unwrap_err();
        assert_eq!(err.to_string(), expected);

        let response = err.to_response().unwrap();
        assert_eq!(response.transaction_id, "TXN-ACC-1-REJECTED");
        assert_eq!(response.status, ResponseStatus::Rejected);
        assert_eq!(response.error_message.as_deref(), Some(expected));
    }

    #[test]
    fn test_convert_request_record_transfer_fields() {
        let mut record = request_record("transfer", Some("10"));
        record.target_account_id = Some("ACC-2".to_string());
        record.source_account_id = Some("".to_string());
        record.currency = Some("USD".to_string());
        record.description = Some("rent".to_string());

        let request = convert_request_record(record).unwrap();
        assert_eq!(request.target_account_id.as_deref(), Some("ACC-2"));
        assert_eq!(request.source_account_id, None);
        assert_eq!(request.currency, "USD");
        assert_eq!(request.description, "rent");
    }

    #[test]
    fn test_convert_request_record_blank_account() {
        let mut record = request_record("credit", Some("10"));
        record.account_id = "  ".to_string();

        let err = convert_request_record(record).unwrap_err();
        assert_eq!(
            err,
            RequestRowError::MissingAccount {
                operation: "credit".to_string()
            }
        );
        assert!(err.to_response().is_none());
    }

    #[rstest]
    #[case(None, AccountStatus::Active)]
    #[case(Some("Blocked"), AccountStatus::Blocked)]
    #[case(Some("closed"), AccountStatus::Closed)]
    fn test_convert_account_record(#[case] status: Option<&str>, #[case] expected: AccountStatus) {
        let account = convert_account_record(account_record(status)).unwrap();

        assert_eq!(account.client_id, "CLI-1");
        assert_eq!(account.available_balance, 100);
        assert_eq!(account.reserved_balance, 0);
        assert_eq!(account.credit_limit, 50);
        assert_eq!(account.status, expected);
    }

    #[test]
    fn test_convert_account_record_errors() {
        assert!(convert_account_record(account_record(Some("frozen")))
            .unwrap_err()
            .contains("Invalid status"));

        let mut negative = account_record(None);
        negative.credit_limit = Some(-1);
        assert!(convert_account_record(negative)
            .unwrap_err()
            .contains("Negative balance"));
    }

    #[test]
    fn test_write_responses_csv() {
        let mut ok = TransactionResponse::success(
            "TXN-000000001",
            &Account::new("ACC-1", "C").with_balances(70, 30, 0),
        );
        ok.timestamp = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let mut failed = TransactionResponse::failed("ACC-2", "account not found: ACC-2");
        failed.timestamp = ok.timestamp;
        assert_eq!(failed.status, ResponseStatus::Failed);

        let mut output = Vec::new();
        write_responses_csv(&[ok, failed], &mut output).unwrap();

        let csv = String::from_utf8(output).unwrap();
        assert_eq!(
            csv,
            "transaction_id,status,balance,reserved_balance,available_balance,timestamp,error_message\n\
             TXN-000000001,success,100,30,70,2026-01-02T03:04:05.000Z,\n\
             TXN-ACC-2-FAILED,failed,0,0,0,2026-01-02T03:04:05.000Z,account not found: ACC-2\n"
        );
    }

    #[test]
    fn test_write_accounts_csv_sorted() {
        let mut blocked = Account::new("ACC-2", "C-2").with_balances(5, 0, 0);
        blocked.status = AccountStatus::Blocked;
        let accounts = vec![blocked, Account::new("ACC-1", "C-1").with_balances(10, 2, 3)];

        let mut output = Vec::new();
        write_accounts_csv(&accounts, &mut output).unwrap();

        let csv = String::from_utf8(output).unwrap();
        assert_eq!(
            csv,
            "account_id,client_id,available_balance,reserved_balance,credit_limit,status\n\
             ACC-1,C-1,10,2,3,active\n\
             ACC-2,C-2,5,0,0,blocked\n"
        );
    }
}
