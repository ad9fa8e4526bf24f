//! I/O module
//!
//! Handles CSV parsing and output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (record conversion, output serialization)
//! - `sync_reader` - Synchronous reader for the account seed file
//! - `async_reader` - Asynchronous request reader with batch reading interface

pub mod async_reader;
pub mod csv_format;
pub mod sync_reader;

pub use async_reader::{AsyncReader, RequestBatch};
pub use csv_format::{
    convert_account_record, convert_request_record, write_accounts_csv, write_responses_csv,
    AccountRecord, RequestRecord, RequestRowError,
};
pub use sync_reader::{load_accounts, AccountReader};
