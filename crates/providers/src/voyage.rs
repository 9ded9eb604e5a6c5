// Voyage AI Backend (hosted, paid)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use tracklab_core::port::{
    EmbedOptions, EmbeddingResult, Provider, ProviderError, ProviderMetadata, RerankEntry,
    RerankOptions, RerankResult,
};

use crate::transport;

const EMBEDDINGS_URL: &str = "https://api.voyageai.com/v1/embeddings";
const RERANK_URL: &str = "https://api.voyageai.com/v1/rerank";

const DEFAULT_EMBEDDING_MODEL: &str = "voyage-3";
const DEFAULT_RERANK_MODEL: &str = "rerank-2";
const EMBEDDING_DIMENSIONS: usize = 1024;

#[derive(Serialize)]
struct EmbeddingsRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingData>,
    model: String,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

#[derive(Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    documents: &'a [String],
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<usize>,
}

#[derive(Deserialize)]
struct RerankResponse {
    data: Vec<RerankData>,
    model: String,
}

#[derive(Deserialize)]
struct RerankData {
    index: usize,
    relevance_score: f32,
}

pub struct VoyageProvider {
    client: reqwest::Client,
    api_key: String,
}

impl VoyageProvider {
    pub fn new(api_key: String) -> Result<Self, ProviderError> {
        if api_key.trim().is_empty() {
            return Err(ProviderError::Config {
                field: "VOYAGE_API_KEY".to_string(),
                details: "API key is empty".to_string(),
            });
        }
        Ok(Self {
            client: transport::build_client()?,
            api_key,
        })
    }

    async fn embed_texts(
        &self,
        texts: &[String],
        opts: &EmbedOptions,
    ) -> Result<Vec<EmbeddingResult>, ProviderError> {
        let model = opts.model.as_deref().unwrap_or(DEFAULT_EMBEDDING_MODEL);
        debug!(count = texts.len(), model, "Voyage embeddings request");

        let response: EmbeddingsResponse = transport::post_json(
            &self.client,
            EMBEDDINGS_URL,
            &self.api_key,
            "embed",
            &EmbeddingsRequest {
                input: texts,
                model,
            },
        )
        .await?;

        if response.data.len() != texts.len() {
            return Err(ProviderError::Api {
                operation: "embed".to_string(),
                message: format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    response.data.len()
                ),
                status_code: None,
            });
        }

        Ok(response
            .data
            .into_iter()
            .map(|d| {
                let dimensions = d.embedding.len();
                EmbeddingResult {
                    embedding: d.embedding,
                    model: response.model.clone(),
                    dimensions,
                }
            })
            .collect())
    }
}

#[async_trait]
impl Provider for VoyageProvider {
    async fn embed(
        &self,
        text: &str,
        opts: &EmbedOptions,
    ) -> Result<EmbeddingResult, ProviderError> {
        let input = [text.to_string()];
        let mut results = self.embed_texts(&input, opts).await?;
        results.pop().ok_or_else(|| ProviderError::Api {
            operation: "embed".to_string(),
            message: "empty embeddings response".to_string(),
            status_code: None,
        })
    }

    async fn embed_batch(
        &self,
        texts: &[String],
        opts: &EmbedOptions,
    ) -> Result<Vec<EmbeddingResult>, ProviderError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.embed_texts(texts, opts).await
    }

    async fn rerank(
        &self,
        query: &str,
        documents: &[String],
        opts: &RerankOptions,
    ) -> Result<RerankResult, ProviderError> {
        let model = opts.model.as_deref().unwrap_or(DEFAULT_RERANK_MODEL);
        debug!(documents = documents.len(), model, "Voyage rerank request");

        let response: RerankResponse = transport::post_json(
            &self.client,
            RERANK_URL,
            &self.api_key,
            "rerank",
            &RerankRequest {
                query,
                documents,
                model,
                top_k: opts.top_k,
            },
        )
        .await?;

        Ok(RerankResult {
            entries: response
                .data
                .into_iter()
                .map(|d| RerankEntry {
                    index: d.index,
                    relevance_score: d.relevance_score,
                })
                .collect(),
            model: response.model,
        })
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    fn metadata(&self) -> ProviderMetadata {
        ProviderMetadata {
            name: "voyage".to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            dimensions: EMBEDDING_DIMENSIONS,
            rerank_model: Some(DEFAULT_RERANK_MODEL.to_string()),
        }
    }
}
