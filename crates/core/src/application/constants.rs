// Application constants (no magic values)
use std::time::Duration;

/// Default retry attempts on top of the first try
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base delay between retry attempts (500ms)
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

/// Ceiling on the exponential retry delay (30s)
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 30_000;

/// Default chunk size / peak parallelism for batch runs
pub const DEFAULT_BATCH_CONCURRENCY: usize = 3;

/// Valid batch concurrency range
pub const MIN_BATCH_CONCURRENCY: usize = 1;
pub const MAX_BATCH_CONCURRENCY: usize = 10;

/// Keep-alive cadence for idle progress streams (30s), chosen so
/// intermediaries do not time out a quiet connection
pub const DEFAULT_KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);
