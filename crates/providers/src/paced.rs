// Paced Provider Decorator
//
// Wraps any Provider behind the concurrency limiter and the retry policy,
// so in-flight request count, start pacing and backoff are enforced at the
// data-flow boundary instead of inside each backend.

use async_trait::async_trait;
use std::sync::Arc;
use tracklab_core::application::{with_retry, ConcurrencyLimiter, PacingWindow, RetryOptions};
use tracklab_core::port::{
    EmbedOptions, EmbeddingResult, Provider, ProviderError, ProviderMetadata, RerankOptions,
    RerankResult,
};

pub struct PacedProvider {
    inner: Arc<dyn Provider>,
    limiter: ConcurrencyLimiter,
    retry: RetryOptions,
}

impl PacedProvider {
    pub fn new(inner: Arc<dyn Provider>, limit: usize) -> Result<Self, ProviderError> {
        let limiter = ConcurrencyLimiter::new(limit).map_err(|e| ProviderError::Config {
            field: "limit".to_string(),
            details: e.to_string(),
        })?;
        Ok(Self {
            inner,
            limiter,
            retry: RetryOptions::default(),
        })
    }

    /// Additionally space out request starts with a jittered pacing window
    pub fn with_pacing(
        inner: Arc<dyn Provider>,
        limit: usize,
        window: PacingWindow,
    ) -> Result<Self, ProviderError> {
        let limiter =
            ConcurrencyLimiter::with_pacing(limit, window).map_err(|e| ProviderError::Config {
                field: "pacing".to_string(),
                details: e.to_string(),
            })?;
        Ok(Self {
            inner,
            limiter,
            retry: RetryOptions::default(),
        })
    }

    pub fn with_retry_options(mut self, retry: RetryOptions) -> Self {
        self.retry = retry;
        self
    }
}

#[async_trait]
impl Provider for PacedProvider {
    async fn embed(
        &self,
        text: &str,
        opts: &EmbedOptions,
    ) -> Result<EmbeddingResult, ProviderError> {
        self.limiter
            .run(|| {
                with_retry(
                    || self.inner.embed(text, opts),
                    &self.retry,
                    ProviderError::is_retryable,
                )
            })
            .await
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        opts: &EmbedOptions,
    ) -> Result<Vec<EmbeddingResult>, ProviderError> {
        self.limiter
            .run(|| {
                with_retry(
                    || self.inner.embed_batch(texts, opts),
                    &self.retry,
                    ProviderError::is_retryable,
                )
            })
            .await
    }

    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        opts: &RerankOptions,
    ) -> Result<RerankResult, ProviderError> {
        self.limiter
            .run(|| {
                with_retry(
                    || self.inner.rerank(query, documents, opts),
                    &self.retry,
                    ProviderError::is_retryable,
                )
            })
            .await
    }

    async fn is_available(&self) -> bool {
        self.inner.is_available().await
    }

    fn metadata(&self) -> ProviderMetadata {
        self.inner.metadata()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracklab_core::port::provider::mocks::{MockBehavior, MockProvider};

    fn fast_retry() -> RetryOptions {
        RetryOptions {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 5,
        }
    }

    #[tokio::test]
    async fn test_retries_rate_limit_then_succeeds() {
        let mock = Arc::new(MockProvider::new(MockBehavior::FailThenSucceed(
            1,
            ProviderError::RateLimit {
                retry_after_ms: None,
            },
        )));
        let paced = PacedProvider::new(mock.clone(), 2)
            .unwrap()
            .with_retry_options(fast_retry());

        let result = paced.embed("hello", &EmbedOptions::default()).await;
        assert!(result.is_ok());
        assert_eq!(mock.call_count(), 2);
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let mock = Arc::new(MockProvider::new(MockBehavior::Fail(ProviderError::Api {
            operation: "embed".to_string(),
            message: "bad request".to_string(),
            status_code: Some(400),
        })));
        let paced = PacedProvider::new(mock.clone(), 2)
            .unwrap()
            .with_retry_options(fast_retry());

        let err = paced
            .embed("hello", &EmbedOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Api { .. }));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_zero_limit_rejected() {
        let mock = Arc::new(MockProvider::new_success());
        assert!(matches!(
            PacedProvider::new(mock, 0),
            Err(ProviderError::Config { .. })
        ));
    }
}
