// Provider Port (Interface)
//
// Capability contract over interchangeable ML backends (hosted paid, hosted
// free-tier, local in-process). Every concrete backend maps its own
// transport-specific failures into exactly one ProviderError variant before
// returning, so the orchestrator and retry layer apply one retryability rule
// regardless of which backend is active.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Shared error taxonomy across all provider variants
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("Provider API error during {operation}: {message}")]
    Api {
        operation: String,
        message: String,
        status_code: Option<u16>,
    },

    #[error("Provider rate limited (retry after {retry_after_ms:?} ms)")]
    RateLimit { retry_after_ms: Option<u64> },

    #[error("Provider unavailable: {reason}")]
    Unavailable { reason: String },

    #[error("Provider configuration error in {field}: {details}")]
    Config { field: String, details: String },

    #[error("Provider timeout during {operation} after {timeout_ms} ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Returned (never thrown) by variants that cannot support an
    /// operation, so callers can degrade gracefully and uniformly
    #[error("Operation not supported by this provider: {operation}")]
    Unsupported { operation: String },
}

impl ProviderError {
    /// One retryability rule set for every backend: rate limits and
    /// timeouts are retryable, everything else is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimit { .. } | ProviderError::Timeout { .. }
        )
    }
}

/// Read-only description of a backend instance. Used for cache-key
/// composition and diagnostics by callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    pub name: String,
    pub embedding_model: String,
    pub dimensions: usize,
    pub rerank_model: Option<String>,
}

/// Options for embed / embed_batch
#[derive(Debug, Clone, Default)]
pub struct EmbedOptions {
    /// Override the provider's default embedding model
    pub model: Option<String>,
}

/// Options for rerank
#[derive(Debug, Clone, Default)]
pub struct RerankOptions {
    /// Override the provider's default rerank model
    pub model: Option<String>,
    /// Return at most this many results
    pub top_k: Option<usize>,
}

/// A single embedding vector with its provenance
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingResult {
    pub embedding: Vec<f32>,
    pub model: String,
    pub dimensions: usize,
}

/// One reranked document reference
#[derive(Debug, Clone, PartialEq)]
pub struct RerankEntry {
    /// Index into the input document list
    pub index: usize,
    pub relevance_score: f32,
}

/// Rerank output, ordered by descending relevance
#[derive(Debug, Clone, PartialEq)]
pub struct RerankResult {
    pub entries: Vec<RerankEntry>,
    pub model: String,
}

/// Provider trait
///
/// Implementations:
/// - VoyageProvider: hosted paid backend (tracklab-providers)
/// - JinaProvider: hosted free-tier backend (tracklab-providers)
/// - LocalProvider: credential-free in-process fallback (tracklab-providers)
#[async_trait]
pub trait Provider: Send + Sync {
    /// Embed a single text
    async fn embed(&self, text: &str, opts: &EmbedOptions)
        -> Result<EmbeddingResult, ProviderError>;

    /// Embed a batch of texts, preserving input order
    async fn embed_batch(
        &self,
        texts: &[String],
        opts: &EmbedOptions,
    ) -> Result<Vec<EmbeddingResult>, ProviderError>;

    /// Rerank documents against a query
    ///
    /// # Errors
    /// - `ProviderError::Unsupported` for backends without a rerank model
    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        opts: &RerankOptions,
    ) -> Result<RerankResult, ProviderError>;

    /// Cheap liveness probe
    async fn is_available(&self) -> bool;

    /// Backend description
    fn metadata(&self) -> ProviderMetadata;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Mock provider behavior
    #[derive(Debug, Clone)]
    pub enum MockBehavior {
        /// Always succeed with a fixed-dimension zero vector
        Success,
        /// Always fail with the given error
        Fail(ProviderError),
        /// Fail N times, then succeed
        FailThenSucceed(u32, ProviderError),
    }

    /// Scripted Provider for testing retry and degradation paths
    pub struct MockProvider {
        behavior: Mutex<MockBehavior>,
        call_count: AtomicU32,
        dimensions: usize,
    }

    impl MockProvider {
        pub fn new(behavior: MockBehavior) -> Self {
            Self {
                behavior: Mutex::new(behavior),
                call_count: AtomicU32::new(0),
                dimensions: 8,
            }
        }

        pub fn new_success() -> Self {
            Self::new(MockBehavior::Success)
        }

        pub fn call_count(&self) -> u32 {
            self.call_count.load(Ordering::SeqCst)
        }

        fn next(&self) -> Result<(), ProviderError> {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            let mut behavior = self.behavior.lock().unwrap();
            match &mut *behavior {
                MockBehavior::Success => Ok(()),
                MockBehavior::Fail(err) => Err(err.clone()),
                MockBehavior::FailThenSucceed(remaining, err) => {
                    if *remaining > 0 {
                        *remaining -= 1;
                        Err(err.clone())
                    } else {
                        Ok(())
                    }
                }
            }
        }

        fn result(&self) -> EmbeddingResult {
            EmbeddingResult {
                embedding: vec![0.0; self.dimensions],
                model: "mock-embed".to_string(),
                dimensions: self.dimensions,
            }
        }
    }

    #[async_trait]
    impl Provider for MockProvider {
        async fn embed(
            &self,
            _text: &str,
            _opts: &EmbedOptions,
        ) -> Result<EmbeddingResult, ProviderError> {
            self.next()?;
            Ok(self.result())
        }

        async fn embed_batch(
            &self,
            texts: &[String],
            _opts: &EmbedOptions,
        ) -> Result<Vec<EmbeddingResult>, ProviderError> {
            self.next()?;
            Ok(texts.iter().map(|_| self.result()).collect())
        }

        async fn rerank(
            &self,
            _query: &str,
            documents: &[String],
            _opts: &RerankOptions,
        ) -> Result<RerankResult, ProviderError> {
            self.next()?;
            Ok(RerankResult {
                entries: (0..documents.len())
                    .map(|index| RerankEntry {
                        index,
                        relevance_score: 1.0 - index as f32 * 0.1,
                    })
                    .collect(),
                model: "mock-rerank".to_string(),
            })
        }

        async fn is_available(&self) -> bool {
            true
        }

        fn metadata(&self) -> ProviderMetadata {
            ProviderMetadata {
                name: "mock".to_string(),
                embedding_model: "mock-embed".to_string(),
                dimensions: self.dimensions,
                rerank_model: Some("mock-rerank".to_string()),
            }
        }
    }
}
