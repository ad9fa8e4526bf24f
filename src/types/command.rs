//! Typed commands dispatched to the operation handlers
//!
//! A `TransactionRequest` carries its operation as a free-form string. Before it
//! reaches a handler it is converted into a `Command`, a closed set of variants
//! matched exhaustively by the engine.

use super::account::{AccountId, MinorUnits};
use super::error::LedgerError;
use super::request::{Operation, TransactionRequest};

/// Single-account money movement (credit, debit, reserve, capture, reversal)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movement {
    pub account_id: AccountId,
    pub amount: MinorUnits,
    pub reference_id: Option<String>,
    pub description: String,
    pub currency: String,
}

/// Dual-account transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOrder {
    pub source_account_id: AccountId,
    pub target_account_id: AccountId,
    pub amount: MinorUnits,
    pub reference_id: Option<String>,
    pub description: String,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Credit(Movement),
    Debit(Movement),
    Reserve(Movement),
    Capture(Movement),
    Reversal(Movement),
    Transfer(TransferOrder),
}

impl Command {
    pub fn operation(&self) -> Operation {
        match self {
            Command::Credit(_) => Operation::Credit,
            Command::Debit(_) => Operation::Debit,
            Command::Reserve(_) => Operation::Reserve,
            Command::Capture(_) => Operation::Capture,
            Command::Reversal(_) => Operation::Reversal,
            Command::Transfer(_) => Operation::Transfer,
        }
    }

    /// Account whose id labels failure responses; the source side for transfers
    pub fn account_id(&self) -> &str {
        match self {
            Command::Credit(m)
            | Command::Debit(m)
            | Command::Reserve(m)
            | Command::Capture(m)
            | Command::Reversal(m) => &m.account_id,
            Command::Transfer(t) => &t.source_account_id,
        }
    }

    pub fn amount(&self) -> MinorUnits {
        match self {
            Command::Credit(m)
            | Command::Debit(m)
            | Command::Reserve(m)
            | Command::Capture(m)
            | Command::Reversal(m) => m.amount,
            Command::Transfer(t) => t.amount,
        }
    }

    pub fn reference_id(&self) -> Option<&str> {
        match self {
            Command::Credit(m)
            | Command::Debit(m)
            | Command::Reserve(m)
            | Command::Capture(m)
            | Command::Reversal(m) => m.reference_id.as_deref(),
            Command::Transfer(t) => t.reference_id.as_deref(),
        }
    }

    pub fn currency(&self) -> &str {
        match self {
            Command::Credit(m)
            | Command::Debit(m)
            | Command::Reserve(m)
            | Command::Capture(m)
            | Command::Reversal(m) => &m.currency,
            Command::Transfer(t) => &t.currency,
        }
    }
}

fn non_empty(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else if trimmed.len() == value.len() {
        Some(value)
    } else {
        Some(trimmed.to_string())
    }
}

impl TryFrom<TransactionRequest> for Command {
    type Error = LedgerError;

    fn try_from(request: TransactionRequest) -> Result<Self, Self::Error> {
        let operation: Operation = request.operation.parse()?;
        let reference_id = non_empty(request.reference_id);

        let wrap: fn(Movement) -> Command = match operation {
            Operation::Credit => Command::Credit,
            Operation::Debit => Command::Debit,
            Operation::Reserve => Command::Reserve,
            Operation::Capture => Command::Capture,
            Operation::Reversal => Command::Reversal,
            Operation::Transfer => {
                let target_account_id = request
                    .target_account_id
                    .and_then(non_empty)
                    .ok_or(LedgerError::MissingTargetAccount)?;
                let source_account_id = request
                    .source_account_id
                    .and_then(non_empty)
                    .unwrap_or(request.account_id);

                return Ok(Command::Transfer(TransferOrder {
                    source_account_id,
                    target_account_id,
                    amount: request.amount,
                    reference_id,
                    description: request.description,
                    currency: request.currency,
                }));
            }
        };

        Ok(wrap(Movement {
            account_id: request.account_id,
            amount: request.amount,
            reference_id,
            description: request.description,
            currency: request.currency,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("credit", Operation::Credit)]
    #[case("Debit", Operation::Debit)]
    #[case("RESERVE", Operation::Reserve)]
    #[case("capture", Operation::Capture)]
    #[case("reversal", Operation::Reversal)]
    fn test_single_account_commands(#[case] op: &str, #[case] expected: Operation) {
        let request = TransactionRequest::new("ACC-1", op, 500, "REF-1");
        let command = Command::try_from(request).unwrap();

        assert_eq!(command.operation(), expected);
        assert_eq!(command.account_id(), "ACC-1");
        assert_eq!(command.amount(), 500);
        assert_eq!(command.reference_id(), Some("REF-1"));
    }

    #[test]
    fn test_transfer_defaults_source_to_account_id() {
        let request = TransactionRequest::new("ACC-1", "transfer", 100, "REF-T").with_target("ACC-2");

        match Command::try_from(request).unwrap() {
            Command::Transfer(order) => {
                assert_eq!(order.source_account_id, "ACC-1");
                assert_eq!(order.target_account_id, "ACC-2");
                assert_eq!(order.amount, 100);
            }
            other => panic!("expected transfer, got {:?}", other),
        }
    }

    #[test]
    fn test_transfer_prefers_explicit_source() {
        let request = TransactionRequest::new("ACC-1", "transfer", 100, "REF-T")
            .with_source("ACC-3")
            .with_target("ACC-2");

        let command = Command::try_from(request).unwrap();
        assert_eq!(command.account_id(), "ACC-3");
    }

    #[test]
    fn test_transfer_without_target_is_an_error() {
        let request = TransactionRequest::new("ACC-1", "transfer", 100, "REF-T");
        assert_eq!(
            Command::try_from(request).unwrap_err(),
            LedgerError::MissingTargetAccount
        );
    }

    #[test]
    fn test_blank_reference_becomes_none() {
        let request = TransactionRequest::new("ACC-1", "credit", 100, "   ");
        let command = Command::try_from(request).unwrap();
        assert_eq!(command.reference_id(), None);
    }

    #[test]
    fn test_unknown_operation_is_an_error() {
        let request = TransactionRequest::new("ACC-1", "invalid-op", 100, "REF");
        let err = Command::try_from(request).unwrap_err();
        assert!(err.to_string().contains("invalid-op"));
    }
}
