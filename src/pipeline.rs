//! End-to-end processing pipeline used by the binary
//!
//! # Architecture
//!
//! ```text
//! Pipeline
//!     ├── AccountReader          (seed accounts, read once)
//!     ├── AsyncReader            (request CSV, batch by batch)
//!     ├── BatchDispatcher        (partitioning + bounded concurrency)
//!     └── Traced<LedgerEngine>   (handlers behind a tracing decorator)
//!         ├── Resilient<InMemoryAccountStore>
//!         └── Resilient<InMemoryLedgerStore>
//! ```
//!
//! Batches are dispatched one after another, so a request never overtakes an
//! earlier request for the same account even when they land in different
//! batches. Responses are written in batch order, each batch sorted by
//! transaction id. Rows rejected by the reader are merged into their batch's
//! responses before sorting.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::core::{BatchDispatcher, DispatcherConfig, LedgerEngine, Traced};
use crate::io::{load_accounts, write_responses_csv, AsyncReader};
use crate::store::{InMemoryAccountStore, InMemoryLedgerStore, Resilient, RetryPolicy};
use crate::types::{Account, TransactionResponse};

/// Configuration for reading the request file
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadConfig {
    /// Number of requests per batch
    pub batch_size: usize,
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self { batch_size: 1000 }
    }
}

impl ReadConfig {
    /// Create a config; a zero batch size falls back to the default
    pub fn new(batch_size: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            tracing::warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch_size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        Self { batch_size }
    }
}

/// Complete configuration of a pipeline run
#[derive(Clone, Debug, Default)]
pub struct PipelineConfig {
    pub read: ReadConfig,
    pub dispatcher: DispatcherConfig,
    pub retry: RetryPolicy,
}

/// Reads requests, dispatches them and writes the responses
#[derive(Debug, Clone, Default)]
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline on a fresh multi-threaded runtime
    ///
    /// Seeds the account store from `accounts_path`, processes every request in
    /// `requests_path`, writes the response CSV to `output` and returns the
    /// final account states.
    ///
    /// # Errors
    ///
    /// Fatal errors only (unreadable files, runtime or output failures).
    /// Individual request failures are reported in the response CSV.
    pub fn run(
        &self,
        accounts_path: &Path,
        requests_path: &Path,
        output: &mut dyn Write,
    ) -> Result<Vec<Account>, String> {
        let seed = load_accounts(accounts_path)?;
        tracing::info!(accounts = seed.len(), path = %accounts_path.display(), "accounts loaded");

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.dispatcher.max_concurrent)
            .enable_all()
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        let (responses, accounts) = runtime.block_on(self.process(seed, requests_path))?;
        write_responses_csv(&responses, output)?;

        Ok(accounts)
    }

    async fn process(
        &self,
        seed: Vec<Account>,
        requests_path: &Path,
    ) -> Result<(Vec<TransactionResponse>, Vec<Account>), String> {
        let accounts = Arc::new(InMemoryAccountStore::with_accounts(seed));
        let engine = LedgerEngine::new(
            Arc::new(Resilient::new(Arc::clone(&accounts), self.config.retry.clone())),
            Arc::new(Resilient::new(
                InMemoryLedgerStore::new(),
                self.config.retry.clone(),
            )),
        );
        let dispatcher =
            BatchDispatcher::new(Arc::new(Traced::new(engine)), self.config.dispatcher.clone());

        let file = tokio::fs::File::open(requests_path).await.map_err(|e| {
            format!(
                "Failed to open file '{}': {}",
                requests_path.display(),
                e
            )
        })?;
        let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
        let mut reader = AsyncReader::new(compat_file);

        let mut responses = Vec::new();
        loop {
            let batch = reader.read_batch(self.config.read.batch_size).await;
            if batch.is_empty() {
                break;
            }

            let mut answered = dispatcher.dispatch(batch.requests).await;
            answered.extend(batch.rejected);
            answered.sort_by(|a, b| a.transaction_id.cmp(&b.transaction_id));
            responses.extend(answered);

            let evicted = dispatcher.handler().inner().lock_registry().evict_idle();
            tracing::debug!(evicted, "idle account locks evicted");
        }

        Ok((responses, accounts.all_accounts()))
    }
}
