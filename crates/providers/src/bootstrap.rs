// Process-Wide Provider Registry
//
// The active provider is created lazily on first use and shared afterwards.
// Creation is checked again under the write lock so concurrent first calls
// build it once. Tests that need a clean slate call reset().

use std::sync::{Arc, RwLock};
use tracing::debug;
use tracklab_core::port::{Provider, ProviderError};

use crate::selection::{select_provider, ProviderConfig};

static ACTIVE: RwLock<Option<Arc<dyn Provider>>> = RwLock::new(None);

/// Return the process-wide provider, creating it from `config` on first call
pub fn active_provider(config: &ProviderConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    {
        let guard = ACTIVE.read().unwrap_or_else(|p| p.into_inner());
        if let Some(provider) = guard.as_ref() {
            return Ok(Arc::clone(provider));
        }
    }

    let mut guard = ACTIVE.write().unwrap_or_else(|p| p.into_inner());
    // Another caller may have won the race between the read and write locks
    if let Some(provider) = guard.as_ref() {
        return Ok(Arc::clone(provider));
    }

    let provider = select_provider(config)?;
    debug!(provider = %provider.metadata().name, "Installed process-wide provider");
    *guard = Some(Arc::clone(&provider));
    Ok(provider)
}

/// Install a specific provider, replacing any existing one
pub fn install(provider: Arc<dyn Provider>) {
    let mut guard = ACTIVE.write().unwrap_or_else(|p| p.into_inner());
    *guard = Some(provider);
}

/// Clear the registry so the next `active_provider` call rebuilds it
pub fn reset() {
    let mut guard = ACTIVE.write().unwrap_or_else(|p| p.into_inner());
    *guard = None;
}

#[cfg(test)]
mod tests {
    use super::*;

    // The registry is process-global, so these assertions live in a single
    // test to avoid cross-test interference under the parallel runner.
    #[test]
    fn test_registry_lifecycle() {
        reset();

        let config = ProviderConfig::default();
        let first = active_provider(&config).unwrap();
        assert_eq!(first.metadata().name, "local");

        // Idempotent: same instance on the second call
        let second = active_provider(&config).unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        reset();
        let third = active_provider(&config).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));

        reset();
    }
}
