//! Logging around operation handlers
//!
//! Handlers stay free of logging calls. [`Traced`] wraps any
//! [`OperationHandler`] and records one span per command plus one event with
//! the outcome.

use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::core::traits::OperationHandler;
use crate::types::{Command, Interrupted, ResponseStatus, TransactionResponse};

/// Tracing decorator for an [`OperationHandler`]
#[derive(Debug)]
pub struct Traced<H> {
    inner: H,
}

impl<H> Traced<H> {
    pub fn new(inner: H) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &H {
        &self.inner
    }
}

#[async_trait]
impl<H: OperationHandler> OperationHandler for Traced<H> {
    async fn handle_until(
        &self,
        command: Command,
        stop: &CancellationToken,
    ) -> Result<TransactionResponse, Interrupted> {
        let span = tracing::info_span!(
            "operation",
            operation = %command.operation(),
            account_id = %command.account_id(),
            reference_id = command.reference_id().unwrap_or_default(),
            amount = command.amount(),
            currency = %command.currency(),
        );

        let started = Instant::now();
        let outcome = self
            .inner
            .handle_until(command, stop)
            .instrument(span.clone())
            .await;
        let elapsed_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

        let response = match outcome {
            Ok(response) => response,
            Err(interrupted) => {
                span.in_scope(|| tracing::warn!(elapsed_us, "operation stopped before any write"));
                return Err(interrupted);
            }
        };

        span.in_scope(|| match response.status {
            ResponseStatus::Success => tracing::info!(
                transaction_id = %response.transaction_id,
                balance = response.balance,
                available = response.available_balance,
                reserved = response.reserved_balance,
                elapsed_us,
                "operation succeeded"
            ),
            ResponseStatus::Failed => tracing::warn!(
                error = response.error_message.as_deref().unwrap_or_default(),
                elapsed_us,
                "operation failed"
            ),
            ResponseStatus::Rejected => tracing::warn!(
                error = response.error_message.as_deref().unwrap_or_default(),
                elapsed_us,
                "operation rejected"
            ),
        });

        Ok(response)
    }
}
