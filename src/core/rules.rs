//! Balance transition rules
//!
//! Pure functions over [`Account`]: each checks its precondition, computes the
//! new balances with checked arithmetic, and only then writes them back. On
//! `Err` the account is untouched, so callers can report its balances as-is.

use crate::types::{Account, EntryType, LedgerEntry, LedgerError, MinorUnits, Operation};

/// Side information a transition produces for the ledger entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Effect {
    /// Part of a debit drawn from the credit limit
    pub credit_drawn: MinorUnits,
}

fn add(a: MinorUnits, b: MinorUnits, op: Operation, account: &Account) -> Result<MinorUnits, LedgerError> {
    a.checked_add(b)
        .ok_or_else(|| LedgerError::arithmetic_overflow(op, &account.account_id))
}

fn sub(a: MinorUnits, b: MinorUnits, op: Operation, account: &Account) -> Result<MinorUnits, LedgerError> {
    a.checked_sub(b)
        .ok_or_else(|| LedgerError::arithmetic_overflow(op, &account.account_id))
}

/// `available += amount`
pub fn credit(account: &mut Account, amount: MinorUnits) -> Result<Effect, LedgerError> {
    account.available_balance = add(account.available_balance, amount, Operation::Credit, account)?;
    Ok(Effect::default())
}

/// Spend available balance first, then the credit limit
///
/// Requires `amount <= available + credit_limit`. When the amount exceeds the
/// available balance, available drops to zero and the shortfall is taken from
/// the credit limit.
pub fn debit(account: &mut Account, amount: MinorUnits) -> Result<Effect, LedgerError> {
    let capacity = add(
        account.available_balance,
        account.credit_limit,
        Operation::Debit,
        account,
    )?;
    if amount > capacity {
        return Err(LedgerError::InsufficientBalance {
            account_id: account.account_id.clone(),
            capacity,
            requested: amount,
        });
    }

    if amount > account.available_balance {
        let drawn = sub(amount, account.available_balance, Operation::Debit, account)?;
        let credit_limit = sub(account.credit_limit, drawn, Operation::Debit, account)?;
        account.available_balance = 0;
        account.credit_limit = credit_limit;
        Ok(Effect {
            credit_drawn: drawn,
        })
    } else {
        account.available_balance = sub(account.available_balance, amount, Operation::Debit, account)?;
        Ok(Effect::default())
    }
}

/// Move funds from available to reserved; the credit limit is not usable
pub fn reserve(account: &mut Account, amount: MinorUnits) -> Result<Effect, LedgerError> {
    if amount > account.available_balance {
        return Err(LedgerError::InsufficientAvailableBalance {
            account_id: account.account_id.clone(),
            operation: Operation::Reserve,
            available: account.available_balance,
            requested: amount,
        });
    }

    let reserved = add(account.reserved_balance, amount, Operation::Reserve, account)?;
    account.available_balance -= amount;
    account.reserved_balance = reserved;
    Ok(Effect::default())
}

/// Move funds from reserved back to available
pub fn capture(account: &mut Account, amount: MinorUnits) -> Result<Effect, LedgerError> {
    if amount > account.reserved_balance {
        return Err(LedgerError::InsufficientReservedBalance {
            account_id: account.account_id.clone(),
            reserved: account.reserved_balance,
            requested: amount,
        });
    }

    let available = add(account.available_balance, amount, Operation::Capture, account)?;
    account.reserved_balance -= amount;
    account.available_balance = available;
    Ok(Effect::default())
}

/// Move `amount` of available balance from `source` to `target`
///
/// Neither account is modified unless both sides can be applied.
pub fn transfer(
    source: &mut Account,
    target: &mut Account,
    amount: MinorUnits,
) -> Result<(), LedgerError> {
    if amount > source.available_balance {
        return Err(LedgerError::InsufficientAvailableBalance {
            account_id: source.account_id.clone(),
            operation: Operation::Transfer,
            available: source.available_balance,
            requested: amount,
        });
    }

    let target_available = add(target.available_balance, amount, Operation::Transfer, target)?;
    source.available_balance -= amount;
    target.available_balance = target_available;
    Ok(())
}

/// Undo the balance effect of `original` on `account`
///
/// Dispatches on the original entry's type:
/// - credit: requires enough available balance, then takes it back
/// - debit: returns the amount, giving the drawn credit back to the credit limit
/// - reserve: releases the hold into available, never below zero reserved
/// - capture: requires enough available balance, then re-reserves it
/// - transfer and reversal cannot be reversed
pub fn reverse(account: &mut Account, original: &LedgerEntry) -> Result<(), LedgerError> {
    let amount = original.amount;
    let op = Operation::Reversal;

    match original.entry_type {
        EntryType::Credit => {
            if account.available_balance < amount {
                return Err(insufficient_to_reverse(account, original));
            }
            account.available_balance -= amount;
        }
        EntryType::Debit => {
            let drawn = original.credit_drawn.clamp(0, amount);
            let available = add(account.available_balance, amount - drawn, op, account)?;
            let credit_limit = add(account.credit_limit, drawn, op, account)?;
            account.available_balance = available;
            account.credit_limit = credit_limit;
        }
        EntryType::Reserve => {
            if account.reserved_balance < amount {
                return Err(LedgerError::InsufficientBalanceToReverse {
                    account_id: account.account_id.clone(),
                    entry_type: original.entry_type,
                    balance: account.reserved_balance,
                    required: amount,
                });
            }
            let reserved = sub(account.reserved_balance, amount, op, account)?;
            let available = add(account.available_balance, amount, op, account)?;
            account.reserved_balance = reserved;
            account.available_balance = available;
        }
        EntryType::Capture => {
            if account.available_balance < amount {
                return Err(insufficient_to_reverse(account, original));
            }
            let reserved = add(account.reserved_balance, amount, op, account)?;
            account.available_balance -= amount;
            account.reserved_balance = reserved;
        }
        EntryType::Transfer | EntryType::Reversal => {
            return Err(LedgerError::UnsupportedReversal {
                entry_type: original.entry_type,
            });
        }
    }

    Ok(())
}

fn insufficient_to_reverse(account: &Account, original: &LedgerEntry) -> LedgerError {
    LedgerError::InsufficientBalanceToReverse {
        account_id: account.account_id.clone(),
        entry_type: original.entry_type,
        balance: account.available_balance,
        required: original.amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn account(available: MinorUnits, reserved: MinorUnits, credit_limit: MinorUnits) -> Account {
        Account::new("ACC-1", "CLIENT-1").with_balances(available, reserved, credit_limit)
    }

    fn entry(entry_type: EntryType, amount: MinorUnits) -> LedgerEntry {
        LedgerEntry::new("ACC-1", entry_type, amount, "", Some("REF-1".to_string()))
    }

    #[test]
    fn test_credit_adds_to_available() {
        let mut acc = account(100, 10, 50);
        credit(&mut acc, 25).unwrap();
        assert_eq!(acc, account(125, 10, 50));
    }

    #[test]
    fn test_credit_overflow_leaves_account_untouched() {
        let mut acc = account(MinorUnits::MAX, 0, 0);
        let err = credit(&mut acc, 1).unwrap_err();
        assert!(matches!(err, LedgerError::ArithmeticOverflow { .. }));
        assert_eq!(acc, account(MinorUnits::MAX, 0, 0));
    }

    #[rstest]
    #[case::within_available(100, 50, 60, (40, 50), 0)]
    #[case::exactly_available(100, 50, 100, (0, 50), 0)]
    #[case::draws_credit(100, 50, 120, (0, 30), 20)]
    #[case::exhausts_credit(100, 50, 150, (0, 0), 50)]
    #[case::empty_account_on_credit(0, 50, 30, (0, 20), 30)]
    fn test_debit_cases(
        #[case] available: MinorUnits,
        #[case] credit_limit: MinorUnits,
        #[case] amount: MinorUnits,
        #[case] expected: (MinorUnits, MinorUnits),
        #[case] drawn: MinorUnits,
    ) {
        let mut acc = account(available, 0, credit_limit);
        let effect = debit(&mut acc, amount).unwrap();

        assert_eq!((acc.available_balance, acc.credit_limit), expected);
        assert_eq!(effect.credit_drawn, drawn);
        assert!(acc.available_balance >= 0);
    }

    #[test]
    fn test_debit_sequence_from_worked_example() {
        let mut acc = account(100, 0, 50);

        debit(&mut acc, 120).unwrap();
        assert_eq!(acc.available_balance, 0);
        assert_eq!(acc.credit_limit, 30);

        let err = debit(&mut acc, 40).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                account_id: "ACC-1".to_string(),
                capacity: 30,
                requested: 40,
            }
        );
        assert_eq!(acc.available_balance, 0);
        assert_eq!(acc.credit_limit, 30);
    }

    #[rstest]
    #[case::fits(100, 40, true)]
    #[case::exact(100, 100, true)]
    #[case::credit_limit_not_usable(100, 101, false)]
    fn test_reserve_ignores_credit_limit(
        #[case] available: MinorUnits,
        #[case] amount: MinorUnits,
        #[case] ok: bool,
    ) {
        let mut acc = account(available, 0, 1_000);
        let result = reserve(&mut acc, amount);

        assert_eq!(result.is_ok(), ok);
        if ok {
            assert_eq!(acc.available_balance, available - amount);
            assert_eq!(acc.reserved_balance, amount);
        } else {
            assert_eq!(acc, account(available, 0, 1_000));
        }
    }

    #[test]
    fn test_capture_requires_reserved_funds() {
        let mut acc = account(0, 30, 0);
        let err = capture(&mut acc, 31).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientReservedBalance { reserved: 30, requested: 31, .. }));

        capture(&mut acc, 30).unwrap();
        assert_eq!(acc, account(30, 0, 0));
    }

    #[test]
    fn test_reserve_then_capture_round_trip() {
        let mut acc = account(500, 20, 0);
        reserve(&mut acc, 200).unwrap();
        capture(&mut acc, 200).unwrap();
        assert_eq!(acc, account(500, 20, 0));
    }

    #[test]
    fn test_transfer_moves_available_only() {
        let mut source = account(100, 0, 500);
        let mut target = Account::new("ACC-2", "CLIENT-2").with_balances(5, 0, 0);

        transfer(&mut source, &mut target, 60).unwrap();
        assert_eq!(source.available_balance, 40);
        assert_eq!(source.credit_limit, 500);
        assert_eq!(target.available_balance, 65);

        let err = transfer(&mut source, &mut target, 41).unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientAvailableBalance { .. }));
        assert_eq!(source.available_balance, 40);
        assert_eq!(target.available_balance, 65);
    }

    #[rstest]
    #[case::credit(EntryType::Credit, account(150, 0, 0), account(100, 0, 0))]
    #[case::debit(EntryType::Debit, account(50, 0, 0), account(100, 0, 0))]
    #[case::reserve(EntryType::Reserve, account(50, 50, 0), account(100, 0, 0))]
    #[case::capture(EntryType::Capture, account(100, 0, 0), account(50, 50, 0))]
    fn test_reverse_restores_pre_operation_state(
        #[case] entry_type: EntryType,
        #[case] after: Account,
        #[case] expected: Account,
    ) {
        let mut after = after;
        reverse(&mut after, &entry(entry_type, 50)).unwrap();
        assert_eq!(after, expected);
    }

    #[test]
    fn test_reverse_debit_gives_back_drawn_credit() {
        let mut acc = account(100, 0, 50);
        let effect = debit(&mut acc, 120).unwrap();

        let original = entry(EntryType::Debit, 120).with_credit_drawn(effect.credit_drawn);
        reverse(&mut acc, &original).unwrap();

        assert_eq!(acc, account(100, 0, 50));
    }

    #[rstest]
    #[case::credit(EntryType::Credit)]
    #[case::capture(EntryType::Capture)]
    fn test_reverse_requires_available_balance(#[case] entry_type: EntryType) {
        let mut acc = account(10, 100, 0);
        let err = reverse(&mut acc, &entry(entry_type, 50)).unwrap_err();

        assert!(matches!(err, LedgerError::InsufficientBalanceToReverse { .. }));
        assert_eq!(acc, account(10, 100, 0));
    }

    #[rstest]
    #[case::transfer(EntryType::Transfer)]
    #[case::reversal(EntryType::Reversal)]
    fn test_reverse_unsupported_types(#[case] entry_type: EntryType) {
        let mut acc = account(100, 100, 0);
        let err = reverse(&mut acc, &entry(entry_type, 10)).unwrap_err();
        assert_eq!(err, LedgerError::UnsupportedReversal { entry_type });
    }

    #[test]
    fn test_reverse_reserve_never_leaves_reserved_negative() {
        let mut acc = account(100, 20, 0);
        let err = reverse(&mut acc, &entry(EntryType::Reserve, 50)).unwrap_err();

        assert!(matches!(
            err,
            LedgerError::InsufficientBalanceToReverse { balance: 20, required: 50, .. }
        ));
        assert_eq!(acc, account(100, 20, 0));
    }
}
