// Time Provider Port
//
// Feeds `Job.created_at` / `updated_at` (epoch ms). Injected rather than
// read from the system clock inline, so lifecycle ordering assertions in
// tests can run against a frozen clock.

/// Source of the current wall-clock time
pub trait TimeProvider: Send + Sync {
    /// Current time in milliseconds since epoch
    fn now_millis(&self) -> i64;
}

/// Wall-clock time provider (production)
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}
