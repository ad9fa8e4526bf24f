//! Rust Ledger Engine CLI
//!
//! Applies a CSV of ledger requests against accounts seeded from another CSV.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --accounts accounts.csv requests.csv > responses.csv
//! cargo run -- --accounts accounts.csv --accounts-out final.csv requests.csv > responses.csv
//! cargo run -- --accounts accounts.csv --batch-size 2000 --max-concurrent 8 requests.csv
//! cargo run -- --accounts accounts.csv --retries 5 --retry-base-ms 100 --store-timeout-ms 500 requests.csv
//! ```
//!
//! Responses are written to stdout as CSV; logs go to stderr (`RUST_LOG`
//! controls the level).
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (missing arguments, file not found, file not readable, etc.)

use rust_ledger_engine::io::write_accounts_csv;
use rust_ledger_engine::pipeline::Pipeline;
use rust_ledger_engine::{cli, telemetry};
use std::fs::File;
use std::process;

fn main() {
    telemetry::init();
    let args = cli::parse_args();

    let pipeline = Pipeline::new(args.to_pipeline_config());

    let mut output = std::io::stdout();
    let accounts = match pipeline.run(&args.accounts_file, &args.requests_file, &mut output) {
        Ok(accounts) => accounts,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    if let Some(path) = &args.accounts_out {
        let written = File::create(path)
            .map_err(|e| format!("Failed to create '{}': {}", path.display(), e))
            .and_then(|mut file| write_accounts_csv(&accounts, &mut file));
        if let Err(e) = written {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    }
}
