//! Synchronous reader for the account seed file
//!
//! Yields one `Result<Account, String>` per CSV row. The seed file is read once
//! at startup, before any request is dispatched, so a blocking reader is
//! enough.
//!
//! ```no_run
//! use rust_ledger_engine::io::sync_reader::AccountReader;
//! use std::path::Path;
//!
//! let reader = AccountReader::new(Path::new("accounts.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(account) => println!("Loaded account: {}", account.account_id),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Fatal errors (file not found) are returned from `new()`
//! - Row errors are yielded as `Err` with the line number

use crate::io::csv_format::{convert_account_record, AccountRecord};
use crate::types::Account;
use csv::{ReaderBuilder, Trim};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Iterator over the accounts of a seed CSV
#[derive(Debug)]
pub struct AccountReader<R: Read = File> {
    reader: csv::Reader<R>,
    line_num: usize,
}

impl AccountReader<File> {
    /// Open a seed file
    ///
    /// # Errors
    ///
    /// Returns a message when the file cannot be opened.
    pub fn new(path: &Path) -> Result<Self, String> {
        let file = File::open(path)
            .map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;
        Ok(Self::from_reader(file))
    }
}

impl<R: Read> AccountReader<R> {
    /// Read seeds from any reader
    pub fn from_reader(reader: R) -> Self {
        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(reader);

        Self {
            reader,
            line_num: 1,
        }
    }
}

impl<R: Read> Iterator for AccountReader<R> {
    type Item = Result<Account, String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<AccountRecord>();
        let next = deserializer.next()?;
        self.line_num += 1;

        match next {
            Ok(record) => Some(
                convert_account_record(record)
                    .map_err(|e| format!("Line {}: {}", self.line_num, e)),
            ),
            Err(e) => Some(Err(format!(
                "Line {}: CSV parse error: {}",
                self.line_num, e
            ))),
        }
    }
}

/// Load every valid account from a seed file
///
/// Invalid rows are logged and skipped.
pub fn load_accounts(path: &Path) -> Result<Vec<Account>, String> {
    let reader = AccountReader::new(path)?;
    let mut accounts = Vec::new();

    for result in reader {
        match result {
            Ok(account) => accounts.push(account),
            Err(error) => tracing::warn!(%error, path = %path.display(), "skipping account row"),
        }
    }

    Ok(accounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccountStatus;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str =
        "account_id,client_id,available_balance,reserved_balance,credit_limit,status\n";

    fn read(rows: &str) -> Vec<Result<Account, String>> {
        let content = format!("{}{}", HEADER, rows);
        AccountReader::from_reader(content.as_bytes()).collect()
    }

    #[test]
    fn test_reads_accounts() {
        let accounts: Vec<Account> = read("ACC-1,CLI-1,100,0,50,active\nACC-2,CLI-2,0,10,0,blocked\n")
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].available_balance, 100);
        assert_eq!(accounts[0].credit_limit, 50);
        assert_eq!(accounts[1].status, AccountStatus::Blocked);
    }

    #[test]
    fn test_optional_columns_default() {
        let accounts: Vec<Account> = read("ACC-1,CLI-1,100\n")
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(accounts[0].reserved_balance, 0);
        assert_eq!(accounts[0].credit_limit, 0);
        assert_eq!(accounts[0].status, AccountStatus::Active);
    }

    #[test]
    fn test_row_errors_carry_line_numbers() {
        let results = read("ACC-1,CLI-1,abc\nACC-2,CLI-2,5\n");

        assert_eq!(results.len(), 2);
        assert!(results[0].as_ref().unwrap_err().starts_with("Line 2"));
        assert!(results[1].is_ok());
    }

    #[test]
    fn test_missing_file() {
        let result = AccountReader::new(Path::new("does/not/exist.csv"));
        assert!(result.unwrap_err().contains("Failed to open file"));
    }

    #[test]
    fn test_load_accounts_skips_invalid_rows() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}ACC-1,C,10\nACC-2,C,-1\nACC-3,C,0,0,0,closed\n", HEADER).unwrap();
        file.flush().unwrap();

        let accounts = load_accounts(file.path()).unwrap();
        let ids: Vec<&str> = accounts.iter().map(|a| a.account_id.as_str()).collect();
        assert_eq!(ids, vec!["ACC-1", "ACC-3"]);
    }
}
