// ID Provider Port
//
// Job ids are opaque strings assigned at creation; the store never invents
// them itself, so tests can pin predictable ids.

/// Source of unique job ids
pub trait IdProvider: Send + Sync {
    /// Generate a new unique job ID
    fn generate_id(&self) -> String;
}

/// UUID v4 ids (production)
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn generate_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}
