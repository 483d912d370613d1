use std::collections::VecDeque;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::{
    decode::{build_generate_request, decode_failure, decode_generation},
    wire::{self, GenerateContentRequest},
    ClientOptions, GenerateRequest, Generation, HistoryEntry, PromptError, Result, RetryPolicy,
    RetryingCaller, Sleeper, TokioSleeper,
};

/// Public Gemini REST endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Model used by [`GeminiClient::from_env`] when `GEMINI_MODEL` is unset.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Strips routing prefixes such as `gemini/` or `models/` from a model name.
///
/// Example: `"gemini/gemini-2.5-flash-lite"` → `"gemini-2.5-flash-lite"`
pub fn normalize_model_name(model: &str) -> String {
    let trimmed = model.trim();
    let trimmed = trimmed.strip_prefix("gemini/").unwrap_or(trimmed);
    let trimmed = trimmed.strip_prefix("models/").unwrap_or(trimmed);
    trimmed.to_owned()
}

/// HTTP client for the Gemini `generateContent` endpoint.
///
/// Every request goes through a [`RetryingCaller`], so `429` responses are
/// retried according to [`ClientOptions`]. Clones share the request history.
#[derive(Clone)]
pub struct GeminiClient<S = TokioSleeper> {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    options: ClientOptions,
    retry: RetryingCaller<S>,
    history: Arc<Mutex<VecDeque<HistoryEntry>>>,
}

impl<S> fmt::Debug for GeminiClient<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"<redacted>")
            .field("options", &self.options)
            .finish()
    }
}

impl GeminiClient<TokioSleeper> {
    /// Creates a client for `model` authenticated with `api_key`.
    pub fn new(api_key: impl Into<String>, model: impl AsRef<str>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_owned(),
            api_key: api_key.into(),
            model: normalize_model_name(model.as_ref()),
            options: ClientOptions::default(),
            retry: RetryingCaller::new(RetryPolicy::default()),
            history: Arc::default(),
        }
    }

    /// Creates a client from environment variables.
    ///
    /// Reads:
    /// - `GEMINI_API_KEY`: API key (required)
    /// - `GEMINI_MODEL`: model name (optional, defaults to [`DEFAULT_MODEL`])
    ///
    /// # Example
    ///
    /// ```no_run
    /// use gemini_prompt::GeminiClient;
    ///
    /// let client = GeminiClient::from_env().expect("missing GEMINI_API_KEY");
    /// ```
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| {
            PromptError::Config("missing GEMINI_API_KEY environment variable".to_owned())
        })?;
        if api_key.trim().is_empty() {
            return Err(PromptError::Config(
                "GEMINI_API_KEY is set but empty".to_owned(),
            ));
        }
        let model = std::env::var("GEMINI_MODEL")
            .ok()
            .filter(|model| !model.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_owned());
        Ok(Self::new(api_key.trim(), model))
    }
}

impl<S: Sleeper> GeminiClient<S> {
    /// Applies timeout, retry and history options.
    ///
    /// Fails when the retry settings do not form a valid [`crate::RetryPolicy`].
    pub fn with_options(mut self, opts: ClientOptions) -> Result<Self> {
        let policy = opts.retry_policy()?;
        self.options = opts;
        self.retry = self.retry.with_policy(policy);
        Ok(self)
    }

    /// Points the client at another server, e.g. a proxy or a test double.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_owned();
        self
    }

    /// Replaces how the client waits between rate-limited attempts.
    pub fn with_sleeper<S2: Sleeper>(self, sleeper: S2) -> GeminiClient<S2> {
        GeminiClient {
            http: self.http,
            base_url: self.base_url,
            api_key: self.api_key,
            model: self.model,
            retry: RetryingCaller::with_sleeper(*self.retry.policy(), sleeper),
            options: self.options,
            history: self.history,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    /// Sends one `generateContent` request and returns the first candidate.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<Generation> {
        let url = self.generate_url();
        let url = url.as_str();
        let payload = &build_generate_request(request);

        let generation = self
            .retry
            .invoke(move || self.send_generate(url, payload))
            .await?;

        self.record(request, &generation.text);
        Ok(generation)
    }

    /// Sends a single user prompt and returns the response text.
    pub async fn complete(&self, prompt: impl Into<String>) -> Result<String> {
        let generation = self.generate(&GenerateRequest::user(prompt)).await?;
        Ok(generation.text)
    }

    /// Returns up to the last `n` exchanges, oldest first.
    pub fn inspect_history(&self, n: usize) -> Vec<HistoryEntry> {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        let skip = history.len().saturating_sub(n);
        history.iter().skip(skip).cloned().collect()
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    async fn send_generate(
        &self,
        url: &str,
        payload: &GenerateContentRequest<'_>,
    ) -> Result<Generation> {
        let response = self
            .http
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .timeout(Duration::from_millis(self.options.timeout_ms))
            .json(payload)
            .send()
            .await
            .map_err(PromptError::Transport)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(PromptError::Transport)?;

        if !status.is_success() {
            #[cfg(feature = "tracing")]
            tracing::debug!(status = status.as_u16(), model = %self.model, "generateContent failed");
            return Err(decode_failure(status, &headers, body));
        }

        let parsed =
            serde_json::from_str::<wire::GenerateContentResponse>(&body).map_err(|err| {
                PromptError::Decode(format!(
                    "invalid generateContent response JSON: {err}; body: {body}"
                ))
            })?;
        decode_generation(parsed)
    }

    fn record(&self, request: &GenerateRequest, response: &str) {
        let limit = self.options.history_limit;
        if limit == 0 {
            return;
        }
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        while history.len() >= limit {
            history.pop_front();
        }
        history.push_back(HistoryEntry {
            model: self.model.clone(),
            request: request.clone(),
            response: response.to_owned(),
        });
    }
}
