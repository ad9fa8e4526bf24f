//! Batch dispatch with account-based partitioning
//!
//! The `BatchDispatcher` takes an ordered list of requests and returns one
//! response per request, sorted by transaction id.
//!
//! # Design
//!
//! Requests are converted into commands first; a request whose operation is not
//! recognized (or a transfer without a target) becomes a `failed` response on
//! the spot. Commands are then partitioned by account id (the source account
//! for transfers). Each partition runs sequentially, preserving submission
//! order per account, while up to `max_concurrent` partitions run at once.
//!
//! ```text
//! requests ──► Command::try_from ──► partition_by_account
//!                    │                     │
//!                 failed              buffer_unordered(max_concurrent)
//!                    │                     │ one task per item
//!                    └────────► sort by transaction_id ──► responses
//! ```
//!
//! # Failure isolation
//!
//! Every item runs in its own tokio task. A panic turns that item into a
//! `failed` response; siblings and the batch carry on.
//!
//! A per-item timeout or batch cancellation does not abort the task. It fires
//! the item's stop token and waits: a handler still waiting for a lock or
//! reading gives up and the item is reported `failed`, while a handler that
//! already started writing finishes (compensation included) and its real
//! outcome is reported. A store that hangs mid-write therefore holds its item
//! until the store's own call timeout fires.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;

use crate::core::traits::OperationHandler;
use crate::types::{
    AccountId, Command, Interrupted, LedgerError, ResponseStatus, TransactionRequest,
    TransactionResponse,
};

/// Configuration for batch dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Maximum number of account partitions processed concurrently
    pub max_concurrent: usize,

    /// Deadline for a single item, `None` for no limit
    pub item_timeout: Option<Duration>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            max_concurrent: num_cpus::get(),
            item_timeout: None,
        }
    }
}

impl DispatcherConfig {
    /// Create a config; a zero `max_concurrent` falls back to the CPU count
    pub fn new(max_concurrent: usize, item_timeout: Option<Duration>) -> Self {
        let default = Self::default();

        let max_concurrent = if max_concurrent == 0 {
            tracing::warn!(
                max_concurrent,
                default = default.max_concurrent,
                "invalid max_concurrent, using default"
            );
            default.max_concurrent
        } else {
            max_concurrent
        };

        Self {
            max_concurrent,
            item_timeout,
        }
    }
}

/// Fans a batch of requests out to an [`OperationHandler`]
#[derive(Debug)]
pub struct BatchDispatcher<H> {
    handler: Arc<H>,
    config: DispatcherConfig,
}

impl<H> Clone for BatchDispatcher<H> {
    fn clone(&self) -> Self {
        Self {
            handler: Arc::clone(&self.handler),
            config: self.config.clone(),
        }
    }
}

impl<H: OperationHandler + 'static> BatchDispatcher<H> {
    pub fn new(handler: Arc<H>, config: DispatcherConfig) -> Self {
        Self { handler, config }
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    pub fn handler(&self) -> &Arc<H> {
        &self.handler
    }

    /// Process a batch and return one response per request
    pub async fn dispatch(&self, requests: Vec<TransactionRequest>) -> Vec<TransactionResponse> {
        self.dispatch_with_cancellation(requests, CancellationToken::new())
            .await
    }

    /// Process a batch that can be cancelled through `cancel`
    ///
    /// Items still queued or running when the token fires are reported as
    /// `failed` with "operation cancelled". Items already finished keep their
    /// responses.
    pub async fn dispatch_with_cancellation(
        &self,
        requests: Vec<TransactionRequest>,
        cancel: CancellationToken,
    ) -> Vec<TransactionResponse> {
        let total = requests.len();
        tracing::info!(
            requests = total,
            max_concurrent = self.config.max_concurrent,
            "dispatching batch"
        );

        let mut responses = Vec::with_capacity(total);
        let mut commands = Vec::with_capacity(total);
        for request in requests {
            let account_id = request.account_id.clone();
            match Command::try_from(request) {
                Ok(command) => commands.push(command),
                Err(error) => {
                    tracing::warn!(%account_id, %error, "request not dispatched");
                    responses.push(TransactionResponse::failed(&account_id, error.to_string()));
                }
            }
        }

        let partitions = partition_by_account(commands);
        let partition_count = partitions.len();

        let results: Vec<Vec<TransactionResponse>> = stream::iter(
            partitions
                .into_iter()
                .map(|(_, commands)| self.run_partition(commands, &cancel)),
        )
        .buffer_unordered(self.config.max_concurrent)
        .collect()
        .await;

        responses.extend(results.into_iter().flatten());
        responses.sort_by(|a, b| a.transaction_id.cmp(&b.transaction_id));

        let succeeded = responses.iter().filter(|r| r.is_success()).count();
        let rejected = responses
            .iter()
            .filter(|r| r.status == ResponseStatus::Rejected)
            .count();
        tracing::info!(
            requests = total,
            partitions = partition_count,
            succeeded,
            rejected,
            failed = total - succeeded - rejected,
            "batch complete"
        );

        responses
    }

    async fn run_partition(
        &self,
        commands: Vec<Command>,
        cancel: &CancellationToken,
    ) -> Vec<TransactionResponse> {
        let mut responses = Vec::with_capacity(commands.len());
        for command in commands {
            responses.push(self.run_item(command, cancel).await);
        }
        responses
    }

    async fn run_item(&self, command: Command, cancel: &CancellationToken) -> TransactionResponse {
        let account_id = command.account_id().to_string();
        if cancel.is_cancelled() {
            return TransactionResponse::failed(&account_id, LedgerError::Cancelled.to_string());
        }

        let stop = cancel.child_token();
        let handler = Arc::clone(&self.handler);
        let task_stop = stop.clone();
        let mut task =
            tokio::spawn(async move { handler.handle_until(command, &task_stop).await });

        let item_timeout = self.config.item_timeout;
        let deadline = async move {
            match item_timeout {
                Some(limit) => tokio::time::sleep(limit).await,
                None => std::future::pending::<()>().await,
            }
        };

        let reason = tokio::select! {
            biased;

            joined = &mut task => return settle(&account_id, joined, LedgerError::Cancelled),
            _ = stop.cancelled() => LedgerError::Cancelled,
            _ = deadline => {
                stop.cancel();
                let after_ms = item_timeout
                    .map(|limit| u64::try_from(limit.as_millis()).unwrap_or(u64::MAX))
                    .unwrap_or_default();
                tracing::warn!(%account_id, after_ms, "operation timed out");
                LedgerError::TimedOut { after_ms }
            }
        };

        settle(&account_id, task.await, reason)
    }
}

/// Turn a finished item task into its response
///
/// `reason` is reported when the handler stopped before writing anything.
fn settle(
    account_id: &str,
    joined: Result<Result<TransactionResponse, Interrupted>, JoinError>,
    reason: LedgerError,
) -> TransactionResponse {
    let error = match joined {
        Ok(Ok(response)) => return response,
        Ok(Err(Interrupted)) => reason,
        Err(join_error) => {
            let message = panic_message(join_error);
            tracing::error!(%account_id, %message, "operation task aborted");
            LedgerError::Aborted { message }
        }
    };

    TransactionResponse::failed(account_id, error.to_string())
}

/// Group commands by account, keeping first-appearance order of accounts
/// and submission order within each group
///
/// Transfers are grouped under their source account.
pub fn partition_by_account(commands: Vec<Command>) -> Vec<(AccountId, Vec<Command>)> {
    let mut index: HashMap<AccountId, usize> = HashMap::new();
    let mut partitions: Vec<(AccountId, Vec<Command>)> = Vec::new();

    for command in commands {
        let account_id = command.account_id();
        match index.get(account_id) {
            Some(&slot) => partitions[slot].1.push(command),
            None => {
                let account_id = account_id.to_string();
                index.insert(account_id.clone(), partitions.len());
                partitions.push((account_id, vec![command]));
            }
        }
    }

    partitions
}

fn panic_message(error: JoinError) -> String {
    if error.is_cancelled() {
        return "task cancelled".to_string();
    }
    match error.try_into_panic() {
        Ok(payload) => payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "panic".to_string()),
        Err(error) => error.to_string(),
    }
}
