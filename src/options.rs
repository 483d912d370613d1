use crate::{Result, RetryPolicy};

/// Configures HTTP timeout, rate-limit retry and history behavior.
#[derive(Clone, Debug, PartialEq)]
pub struct ClientOptions {
    /// Per-request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum number of attempts per call, the first one included.
    pub max_retries: u32,
    /// Base retry backoff in seconds (exponential strategy).
    pub retry_backoff_secs: f64,
    /// Number of exchanges kept for [`crate::GeminiClient::inspect_history`].
    pub history_limit: usize,
}

impl ClientOptions {
    /// Validated retry policy described by these options.
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        RetryPolicy::new(self.max_retries, self.retry_backoff_secs)
    }
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout_ms: 60_000,
            max_retries: 5,
            retry_backoff_secs: 1.0,
            history_limit: 16,
        }
    }
}
