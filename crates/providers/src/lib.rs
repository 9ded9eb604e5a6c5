// Provider Backends
//
// Concrete implementations of the core Provider port: two hosted HTTP
// backends (Voyage paid, Jina free-tier), a credential-free local fallback,
// a pacing/retry decorator, and env-driven selection + bootstrap.

pub mod bootstrap;
pub mod jina;
pub mod local;
pub mod paced;
pub mod selection;
mod transport;
pub mod voyage;

pub use bootstrap::{active_provider, reset};
pub use jina::JinaProvider;
pub use local::LocalProvider;
pub use paced::PacedProvider;
pub use selection::{select_provider, ProviderConfig};
pub use voyage::VoyageProvider;
