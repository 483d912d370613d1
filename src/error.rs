use crate::DelayHint;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// Network or request execution error from `reqwest`.
    #[error("transport error: {0}")]
    Transport(reqwest::Error),
    /// Upstream answered `429 Too Many Requests`. Retried by [`crate::RetryingCaller`].
    #[error("rate limited: {message}")]
    RateLimited {
        /// Provider-suggested wait, when one could be parsed.
        hint: Option<DelayHint>,
        /// Upstream error message, or the raw body when it had no envelope.
        message: String,
    },
    /// Every attempt allowed by the retry policy was rate limited.
    #[error("rate limit still in effect after {attempts} attempt(s): {message}")]
    RateLimitExhausted {
        /// Number of attempts performed.
        attempts: u32,
        /// Message of the last rate-limit response.
        message: String,
    },
    /// Non-success HTTP status code other than 429.
    #[error("http error {status}: {body}")]
    Http { status: u16, body: String },
    /// The model refused to answer the prompt.
    #[error("prompt blocked: {reason}")]
    Blocked { reason: String },
    /// Response decoding or protocol-shape validation error.
    #[error("decode error: {0}")]
    Decode(String),
    /// Model output did not match the declared signature.
    #[error("output parse error: {0}")]
    Parse(String),
    /// Invalid client, policy or credential configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl PromptError {
    /// Returns `true` for the retryable rate-limit failure.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }

    /// Returns `true` once the retry budget was spent on rate limits.
    pub fn is_rate_limit_exhausted(&self) -> bool {
        matches!(self, Self::RateLimitExhausted { .. })
    }
}
