use crate::core::DispatcherConfig;
use crate::pipeline::{PipelineConfig, ReadConfig};
use crate::store::RetryPolicy;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Apply a batch of ledger requests against seeded accounts
#[derive(Parser, Debug)]
#[command(name = "ledger-engine")]
#[command(about = "Apply a batch of ledger requests against seeded accounts", long_about = None)]
pub struct CliArgs {
    /// Request CSV file path
    #[arg(value_name = "REQUESTS", help = "Path to the request CSV file")]
    pub requests_file: PathBuf,

    /// Account seed CSV file path
    #[arg(
        long = "accounts",
        value_name = "ACCOUNTS",
        help = "Path to the CSV file seeding the account store"
    )]
    pub accounts_file: PathBuf,

    /// Where to write the final account states
    #[arg(
        long = "accounts-out",
        value_name = "PATH",
        help = "Write final account states as CSV to this path"
    )]
    pub accounts_out: Option<PathBuf>,

    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of requests per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of accounts processed concurrently (default: CPU cores)"
    )]
    pub max_concurrent: Option<usize>,

    #[arg(
        long = "item-timeout-ms",
        value_name = "MS",
        help = "Fail a single request that runs longer than this"
    )]
    pub item_timeout_ms: Option<u64>,

    #[arg(
        long = "retries",
        value_name = "COUNT",
        help = "Retries for transient store errors (default: 3)"
    )]
    pub retries: Option<u32>,

    #[arg(
        long = "retry-base-ms",
        value_name = "MS",
        help = "Delay before the first retry, doubled for each further retry (default: 1000)"
    )]
    pub retry_base_ms: Option<u64>,

    #[arg(
        long = "store-timeout-ms",
        value_name = "MS",
        help = "Deadline for a single store call"
    )]
    pub store_timeout_ms: Option<u64>,
}

impl CliArgs {
    /// Create a DispatcherConfig from CLI arguments, defaults filling the gaps
    pub fn to_dispatcher_config(&self) -> DispatcherConfig {
        let default = DispatcherConfig::default();
        DispatcherConfig::new(
            self.max_concurrent.unwrap_or(default.max_concurrent),
            self.item_timeout_ms.map(Duration::from_millis),
        )
    }

    pub fn to_retry_policy(&self) -> RetryPolicy {
        let default = RetryPolicy::default();
        let policy = RetryPolicy::new(
            self.retries.unwrap_or(default.max_retries),
            self.retry_base_ms
                .map(Duration::from_millis)
                .unwrap_or(default.base_delay),
            default.factor,
        );

        match self.store_timeout_ms {
            Some(ms) => policy.with_call_timeout(Duration::from_millis(ms)),
            None => policy,
        }
    }

    pub fn to_read_config(&self) -> ReadConfig {
        match self.batch_size {
            Some(batch_size) => ReadConfig::new(batch_size),
            None => ReadConfig::default(),
        }
    }

    pub fn to_pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            read: self.to_read_config(),
            dispatcher: self.to_dispatcher_config(),
            retry: self.to_retry_policy(),
        }
    }
}
