//! Retry with exponential backoff around store collaborator calls
//!
//! [`RetryPolicy`] re-runs a store call while it fails with a transient error
//! (`Transient` or `Timeout`), sleeping `base_delay * factor^(n-1)` before the
//! n-th retry. An optional per-call timeout turns a hung call into a
//! `Timeout` error, which is itself retried for idempotent calls. Once the
//! retry budget is spent the last error is returned; the handlers map it to a
//! `failed` response.
//!
//! [`Resilient`] applies a policy to every call of a wrapped store.
//!
//! # Ledger appends
//!
//! An append that timed out may still have landed, and a second attempt
//! would write the entry twice. `ledger.append` is therefore retried only on
//! `Transient` errors, which a store must raise only when nothing was written;
//! a `Timeout` is returned to the handler after the first attempt.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::traits::{AccountStore, LedgerStore};
use crate::types::{Account, EntryId, LedgerEntry, StoreError};

/// Backoff configuration for store calls
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Multiplier applied to the delay for each further retry
    pub factor: u32,
    /// Deadline for a single attempt
    pub call_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            factor: 2,
            call_timeout: None,
        }
    }
}

impl RetryPolicy {
    /// Create a policy; a zero factor falls back to the default factor
    pub fn new(max_retries: u32, base_delay: Duration, factor: u32) -> Self {
        let default = Self::default();

        let factor = if factor == 0 {
            tracing::warn!(
                factor,
                default = default.factor,
                "invalid backoff factor, using default"
            );
            default.factor
        } else {
            factor
        };

        Self {
            max_retries,
            base_delay,
            factor,
            call_timeout: None,
        }
    }

    /// Policy that makes exactly one attempt
    pub fn no_retry() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = Some(call_timeout);
        self
    }

    /// Delay to wait before the given retry (1-based)
    pub fn delay_for(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1);
        let multiplier = self.factor.saturating_pow(exponent);
        self.base_delay.saturating_mul(multiplier)
    }

    /// Run an idempotent `call` under this policy
    ///
    /// `operation` names the call in logs and timeout errors.
    pub async fn run<T, F, Fut>(&self, operation: &str, call: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        self.attempt(operation, true, call).await
    }

    /// Run a call that must not be repeated once it may have taken effect
    ///
    /// Only `Transient` errors are retried; a `Timeout` is returned as is.
    pub async fn run_non_idempotent<T, F, Fut>(
        &self,
        operation: &str,
        call: F,
    ) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        self.attempt(operation, false, call).await
    }

    async fn attempt<T, F, Fut>(
        &self,
        operation: &str,
        retry_timeouts: bool,
        mut call: F,
    ) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        let retryable = |error: &StoreError| match error {
            StoreError::Timeout { .. } => retry_timeouts,
            other => other.is_transient(),
        };

        let mut retry = 0;
        loop {
            let outcome = match self.call_timeout {
                Some(limit) => match tokio::time::timeout(limit, call()).await {
                    Ok(result) => result,
                    Err(_) => Err(StoreError::Timeout {
                        operation: operation.to_string(),
                        after_ms: u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    }),
                },
                None => call().await,
            };

            match outcome {
                Err(error) if retryable(&error) && retry < self.max_retries => {
                    retry += 1;
                    let delay = self.delay_for(retry);
                    tracing::warn!(
                        operation,
                        retry,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        %error,
                        "store call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    if error.is_transient() {
                        tracing::error!(operation, attempts = retry + 1, %error, "store call retries exhausted");
                    }
                    return Err(error);
                }
                Ok(value) => return Ok(value),
            }
        }
    }
}

/// Store decorator applying a [`RetryPolicy`] to every call
#[derive(Debug)]
pub struct Resilient<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S> Resilient<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}

#[async_trait]
impl<S: AccountStore> AccountStore for Resilient<S> {
    async fn get(&self, account_id: &str) -> Result<Account, StoreError> {
        self.policy
            .run("account.get", || self.inner.get(account_id))
            .await
    }

    async fn update(&self, account: &Account) -> Result<(), StoreError> {
        self.policy
            .run("account.update", || self.inner.update(account))
            .await
    }
}

#[async_trait]
impl<S: LedgerStore> LedgerStore for Resilient<S> {
    async fn append(&self, entry: LedgerEntry) -> Result<EntryId, StoreError> {
        self.policy
            .run_non_idempotent("ledger.append", || self.inner.append(entry.clone()))
            .await
    }

    async fn find_by_reference_id(
        &self,
        reference_id: &str,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        self.policy
            .run("ledger.find_by_reference_id", || {
                self.inner.find_by_reference_id(reference_id)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::InMemoryLedgerStore;
    use crate::types::EntryType;
    use rstest::rstest;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Ledger that fails the first `failures` calls with the given error
    struct FlakyLedger {
        inner: InMemoryLedgerStore,
        failures: u32,
        error: StoreError,
        calls: Arc<AtomicU32>,
    }

    impl FlakyLedger {
        fn new(failures: u32, error: StoreError) -> Self {
            Self {
                inner: InMemoryLedgerStore::new(),
                failures,
                error,
                calls: Arc::new(AtomicU32::new(0)),
            }
        }
    }

    #[async_trait]
    impl LedgerStore for FlakyLedger {
        async fn append(&self, entry: LedgerEntry) -> Result<EntryId, StoreError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(self.error.clone());
            }
            self.inner.append(entry).await
        }

        async fn find_by_reference_id(
            &self,
            reference_id: &str,
        ) -> Result<Option<LedgerEntry>, StoreError> {
            self.inner.find_by_reference_id(reference_id).await
        }
    }

    /// Ledger whose calls never complete
    #[derive(Default)]
    struct HungLedger {
        calls: AtomicU32,
    }

    #[async_trait]
    impl LedgerStore for HungLedger {
        async fn append(&self, _entry: LedgerEntry) -> Result<EntryId, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            futures::future::pending().await
        }

        async fn find_by_reference_id(
            &self,
            _reference_id: &str,
        ) -> Result<Option<LedgerEntry>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            futures::future::pending().await
        }
    }

    fn entry() -> LedgerEntry {
        LedgerEntry::new("ACC-1", EntryType::Credit, 10, "", None)
    }

    #[rstest]
    #[case(1, Duration::from_secs(1))]
    #[case(2, Duration::from_secs(2))]
    #[case(3, Duration::from_secs(4))]
    #[case(4, Duration::from_secs(8))]
    fn test_default_backoff_schedule(#[case] retry: u32, #[case] expected: Duration) {
        assert_eq!(RetryPolicy::default().delay_for(retry), expected);
    }

    #[test]
    fn test_zero_factor_falls_back_to_default() {
        let policy = RetryPolicy::new(2, Duration::from_millis(10), 0);
        assert_eq!(policy.factor, 2);
        assert_eq!(policy.max_retries, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let flaky = FlakyLedger::new(2, StoreError::transient("connection reset"));
        let calls = Arc::clone(&flaky.calls);
        let ledger = Resilient::new(flaky, RetryPolicy::default());

        let started = tokio::time::Instant::now();
        let id = ledger.append(entry()).await.unwrap();

        assert_eq!(id, "TXN-000000001");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let flaky = FlakyLedger::new(u32::MAX, StoreError::transient("still down"));
        let calls = Arc::clone(&flaky.calls);
        let ledger = Resilient::new(flaky, RetryPolicy::default());

        let started = tokio::time::Instant::now();
        let err = ledger.append(entry()).await.unwrap_err();

        assert_eq!(err, StoreError::transient("still down"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(1 + 2 + 4));
    }

    #[tokio::test]
    async fn test_permanent_errors_are_not_retried() {
        let flaky = FlakyLedger::new(u32::MAX, StoreError::not_found("ACC-1"));
        let calls = Arc::clone(&flaky.calls);
        let ledger = Resilient::new(flaky, RetryPolicy::default());

        let err = ledger.append(entry()).await.unwrap_err();

        assert_eq!(err, StoreError::not_found("ACC-1"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_call_timeout_maps_to_timeout_error() {
        let policy = RetryPolicy::new(1, Duration::from_millis(100), 2)
            .with_call_timeout(Duration::from_millis(250));
        let ledger = Resilient::new(HungLedger::default(), policy);

        let err = ledger.append(entry()).await.unwrap_err();
        assert_eq!(
            err,
            StoreError::Timeout {
                operation: "ledger.append".to_string(),
                after_ms: 250,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_append_is_not_repeated() {
        let policy = RetryPolicy::new(3, Duration::from_millis(100), 2)
            .with_call_timeout(Duration::from_millis(250));
        let ledger = Resilient::new(HungLedger::default(), policy);

        let started = tokio::time::Instant::now();
        assert!(ledger.append(entry()).await.is_err());

        assert_eq!(ledger.inner().calls.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::from_millis(250));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_lookup_is_retried() {
        let policy = RetryPolicy::new(1, Duration::from_millis(100), 2)
            .with_call_timeout(Duration::from_millis(250));
        let ledger = Resilient::new(HungLedger::default(), policy);

        let started = tokio::time::Instant::now();
        let err = ledger.find_by_reference_id("REF-1").await.unwrap_err();

        assert!(matches!(err, StoreError::Timeout { .. }));
        assert_eq!(ledger.inner().calls.load(Ordering::SeqCst), 2);
        assert_eq!(started.elapsed(), Duration::from_millis(250 + 100 + 250));
    }

    #[tokio::test]
    async fn test_no_retry_policy_makes_single_attempt() {
        let flaky = FlakyLedger::new(1, StoreError::transient("blip"));
        let calls = Arc::clone(&flaky.calls);
        let ledger = Resilient::new(flaky, RetryPolicy::no_retry());

        assert!(ledger.append(entry()).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
