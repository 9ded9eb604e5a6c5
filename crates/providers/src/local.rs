// Local Backend (credential-free in-process fallback)
//
// Deterministic hashed bag-of-words embedding: each lowercased token is
// hashed into a fixed-dimension bucket and the vector is L2-normalized.
// Not semantically meaningful, but stable across runs, which keeps the
// rest of the pipeline exercisable without any API key.

use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use tracklab_core::port::{
    EmbedOptions, EmbeddingResult, Provider, ProviderError, ProviderMetadata, RerankOptions,
    RerankResult,
};

const MODEL_NAME: &str = "local-hash-v1";
const DIMENSIONS: usize = 256;

#[derive(Debug, Default)]
pub struct LocalProvider;

impl LocalProvider {
    pub fn new() -> Self {
        Self
    }

    fn embed_text(text: &str) -> EmbeddingResult {
        let mut vector = vec![0.0f32; DIMENSIONS];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() as usize) % DIMENSIONS;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }

        EmbeddingResult {
            embedding: vector,
            model: MODEL_NAME.to_string(),
            dimensions: DIMENSIONS,
        }
    }
}

#[async_trait]
impl Provider for LocalProvider {
    async fn embed(
        &self,
        text: &str,
        _opts: &EmbedOptions,
    ) -> Result<EmbeddingResult, ProviderError> {
        Ok(Self::embed_text(text))
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        _opts: &EmbedOptions,
    ) -> Result<Vec<EmbeddingResult>, ProviderError> {
        Ok(texts.iter().map(|t| Self::embed_text(t)).collect())
    }

    async fn rerank(
        &self,
        _query: &str,
        _documents: &[String],
        _opts: &RerankOptions,
    ) -> Result<RerankResult, ProviderError> {
        Err(ProviderError::Unsupported {
            operation: "rerank".to_string(),
        })
    }

    async fn is_available(&self) -> bool {
        true
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: "local".to_string(),
            embedding_model: MODEL_NAME.to_string(),
            dimensions: DIMENSIONS,
            rerank_model: None,
        }
    }
}
