use async_trait::async_trait;
use extract::{GenerateOptions, LanguageModel, LlmError};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

use crate::config::RetryConfig;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: usize,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: usize, initial_backoff_ms: u64, max_backoff_ms: u64) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::from_millis(initial_backoff_ms),
            max_backoff: Duration::from_millis(max_backoff_ms),
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, config.initial_backoff_ms, config.max_backoff_ms)
    }

    /// Retry a future with exponential backoff
    pub async fn retry<F, Fut, T, E>(&self, operation_name: &str, f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.retry_if(operation_name, |_| true, f).await
    }

    /// Like [`retry`](Self::retry), but gives up at once on errors that
    /// `is_retryable` rejects.
    pub async fn retry_if<F, Fut, T, E, P>(
        &self,
        operation_name: &str,
        is_retryable: P,
        mut f: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
        P: Fn(&E) -> bool,
    {
        let mut attempt = 0;
        let mut backoff = self.initial_backoff;

        loop {
            match f().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!(
                            operation = operation_name,
                            attempts = attempt + 1,
                            "Operation succeeded after retries"
                        );
                    }
                    return Ok(result);
                }
                Err(e) if !is_retryable(&e) => {
                    warn!(operation = operation_name, error = %e, "Operation failed, not retryable");
                    return Err(e);
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        warn!(
                            operation = operation_name,
                            attempts = attempt,
                            error = %e,
                            "Operation failed after max retries"
                        );
                        return Err(e);
                    }

                    warn!(
                        operation = operation_name,
                        attempt = attempt,
                        max_retries = self.max_retries,
                        backoff_ms = backoff.as_millis(),
                        error = %e,
                        "Operation failed, retrying"
                    );

                    sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, self.max_backoff);
                }
            }
        }
    }
}

/// Transport failures, server errors, rate limiting and blank replies are
/// worth another attempt. An unreachable backend or a client error is not.
pub fn is_transient(error: &LlmError) -> bool {
    match error {
        LlmError::Unavailable(_) => false,
        LlmError::Status(status) => *status >= 500 || *status == 429,
        LlmError::Request(_) | LlmError::Decode(_) | LlmError::Empty | LlmError::Timeout(_) => true,
    }
}

/// [`LanguageModel`] decorator that retries transient failures.
pub struct RetryingModel<M> {
    inner: M,
    policy: RetryPolicy,
}

impl<M: LanguageModel> RetryingModel<M> {
    pub fn new(inner: M, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }
}

#[async_trait]
impl<M: LanguageModel> LanguageModel for RetryingModel<M> {
    async fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<String, LlmError> {
        self.policy
            .retry_if("llm_generate", is_transient, || self.inner.generate(prompt, options))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use extract::testing::ScriptedModel;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy(max_retries: usize) -> RetryPolicy {
        RetryPolicy::new(max_retries, 1, 2)
    }

    #[tokio::test]
    async fn retries_until_success() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result: Result<&str, String> = fast_policy(3)
            .retry("flaky", || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err("boom".to_string())
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let result: Result<(), String> = fast_policy(2)
            .retry("broken", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err("boom".to_string())
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn unavailable_backend_is_not_retried() {
        let model = ScriptedModel::new().with_default_error(LlmError::Unavailable("down".into()));
        let retrying = RetryingModel::new(std::sync::Arc::new(model), fast_policy(3));

        let err = retrying.generate("p", &GenerateOptions::default()).await.unwrap_err();
        assert_eq!(err, LlmError::Unavailable("down".into()));
        assert_eq!(retrying.inner.call_count(), 1);
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let model = ScriptedModel::new().with_default_error(LlmError::Status(503));
        let retrying = RetryingModel::new(std::sync::Arc::new(model), fast_policy(2));

        assert!(retrying.generate("p", &GenerateOptions::default()).await.is_err());
        assert_eq!(retrying.inner.call_count(), 3);
    }

    #[test]
    fn transient_classification() {
        assert!(is_transient(&LlmError::Status(500)));
        assert!(is_transient(&LlmError::Status(429)));
        assert!(!is_transient(&LlmError::Status(404)));
        assert!(is_transient(&LlmError::Empty));
        assert!(!is_transient(&LlmError::Unavailable("x".into())));
    }
}
