use std::future::Future;
use std::time::Duration;

use crate::{
    decode::{decode_failure, decode_passages},
    wire, Passage, PromptError, Result, RetryPolicy, RetryingCaller, Sleeper, TokioSleeper,
};

/// English Wikipedia Action API.
pub const WIKIPEDIA_API_URL: &str = "https://en.wikipedia.org/w/api.php";

const USER_AGENT: &str = concat!(
    "gemini-prompt/",
    env!("CARGO_PKG_VERSION"),
    " (retrieval demo; https://www.mediawiki.org/wiki/API:Etiquette)"
);

/// Text search returning ranked passages for a query.
pub trait SearchProvider {
    fn search(&self, query: &str, k: usize) -> impl Future<Output = Result<Vec<Passage>>>;
}

/// Full-text search over Wikipedia page snippets.
#[derive(Clone, Debug)]
pub struct WikipediaSearch<S = TokioSleeper> {
    http: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    retry: RetryingCaller<S>,
}

impl WikipediaSearch<TokioSleeper> {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: WIKIPEDIA_API_URL.to_owned(),
            timeout: Duration::from_secs(10),
            retry: RetryingCaller::new(RetryPolicy::default()),
        }
    }
}

impl Default for WikipediaSearch<TokioSleeper> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Sleeper> WikipediaSearch<S> {
    /// Uses another MediaWiki `api.php` endpoint, e.g. another language edition.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = self.retry.with_policy(policy);
        self
    }

    pub fn with_sleeper<S2: Sleeper>(self, sleeper: S2) -> WikipediaSearch<S2> {
        WikipediaSearch {
            http: self.http,
            endpoint: self.endpoint,
            timeout: self.timeout,
            retry: RetryingCaller::with_sleeper(*self.retry.policy(), sleeper),
        }
    }

    async fn search_once(&self, query: &str, k: usize) -> Result<Vec<Passage>> {
        let limit = k.to_string();
        let response = self
            .http
            .get(&self.endpoint)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .timeout(self.timeout)
            .query(&[
                ("action", "query"),
                ("list", "search"),
                ("format", "json"),
                ("formatversion", "2"),
                ("srsearch", query),
                ("srlimit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(PromptError::Transport)?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await.map_err(PromptError::Transport)?;

        if !status.is_success() {
            return Err(decode_failure(status, &headers, body));
        }

        let parsed = serde_json::from_str::<wire::SearchResponse>(&body).map_err(|err| {
            PromptError::Decode(format!("invalid search response JSON: {err}; body: {body}"))
        })?;
        Ok(decode_passages(parsed, k))
    }
}

impl<S: Sleeper> SearchProvider for WikipediaSearch<S> {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<Passage>> {
        if k == 0 || query.trim().is_empty() {
            return Ok(Vec::new());
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(query, k, "searching wikipedia");

        self.retry
            .invoke(move || self.search_once(query, k))
            .await
    }
}
