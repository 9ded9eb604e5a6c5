// Provider Selection
//
// Resolution order: explicit override wins, then the first backend with a
// credential (paid before free-tier), then the local fallback. An invalid
// override is a configuration error rather than a silent fallback.

use std::env;
use std::sync::Arc;
use tracing::info;
use tracklab_core::port::{Provider, ProviderError};

use crate::jina::JinaProvider;
use crate::local::LocalProvider;
use crate::voyage::VoyageProvider;

pub const ENV_PROVIDER_OVERRIDE: &str = "TRACKLAB_PROVIDER";
pub const ENV_VOYAGE_API_KEY: &str = "VOYAGE_API_KEY";
pub const ENV_JINA_API_KEY: &str = "JINA_API_KEY";

#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    pub provider_override: Option<String>,
    pub voyage_api_key: Option<String>,
    pub jina_api_key: Option<String>,
}

impl ProviderConfig {
    pub fn from_env() -> Self {
        Self {
            provider_override: read_env(ENV_PROVIDER_OVERRIDE),
            voyage_api_key: read_env(ENV_VOYAGE_API_KEY),
            jina_api_key: read_env(ENV_JINA_API_KEY),
        }
    }
}

fn read_env(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

pub fn select_provider(config: &ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let provider: Arc<dyn Provider> = match config.provider_override.as_deref() {
        Some("voyage") => {
            let key = config
                .voyage_api_key
                .clone()
                .ok_or_else(|| ProviderError::Config {
                    field: ENV_VOYAGE_API_KEY.to_string(),
                    details: "voyage selected but no API key configured".to_string(),
                })?;
            Arc::new(VoyageProvider::new(key)?)
        }
        Some("jina") => {
            let key = config
                .jina_api_key
                .clone()
                .ok_or_else(|| ProviderError::Config {
                    field: ENV_JINA_API_KEY.to_string(),
                    details: "jina selected but no API key configured".to_string(),
                })?;
            Arc::new(JinaProvider::new(key)?)
        }
        Some("local") => Arc::new(LocalProvider::new()),
        Some(other) => {
            return Err(ProviderError::Config {
                field: ENV_PROVIDER_OVERRIDE.to_string(),
                details: format!("unknown provider '{}'", other),
            })
        }
        None => {
            if let Some(key) = config.voyage_api_key.clone() {
                Arc::new(VoyageProvider::new(key)?)
            } else if let Some(key) = config.jina_api_key.clone() {
                Arc::new(JinaProvider::new(key)?)
            } else {
                Arc::new(LocalProvider::new())
            }
        }
    };

    info!(provider = %provider.metadata().name, "Selected embedding provider");
    Ok(provider)
}
