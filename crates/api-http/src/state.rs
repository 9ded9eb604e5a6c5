use std::sync::Arc;
use tracklab_core::application::{ProgressEventBus, StreamConfig};
use tracklab_core::port::JobStore;

/// Shared handler state, cloned per request
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub bus: Arc<ProgressEventBus>,
    pub stream_config: StreamConfig,
}

impl AppState {
    pub fn new(store: Arc<dyn JobStore>, bus: Arc<ProgressEventBus>) -> Self {
        Self {
            store,
            bus,
            stream_config: StreamConfig::default(),
        }
    }

    pub fn with_stream_config(mut self, stream_config: StreamConfig) -> Self {
        self.stream_config = stream_config;
        self
    }
}
