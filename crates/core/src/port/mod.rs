// Port Layer - Interfaces for external dependencies

pub mod id_provider;
pub mod job_store;
pub mod provider;
pub mod time_provider;

// Re-exports
pub use id_provider::IdProvider;
pub use job_store::{JobStore, StoreError};
pub use provider::{
    EmbedOptions, EmbeddingResult, Provider, ProviderError, ProviderMetadata, RerankEntry,
    RerankOptions, RerankResult,
};
pub use time_provider::TimeProvider;
