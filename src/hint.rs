use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};

use crate::wire;

/// Where a [`DelayHint`] was read from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HintSource {
    /// Standard `Retry-After` header, in seconds.
    RetryAfterHeader,
    /// `google.rpc.RetryInfo.retryDelay` in the error payload, e.g. `"5s"`.
    RetryInfo,
    /// Human-readable `"... retry in 5.2s"` in the error message.
    Message,
}

/// Provider-suggested wait before the next attempt.
///
/// Negative values are floored to zero. Unparseable or non-finite values
/// never produce a hint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DelayHint {
    pub delay: Duration,
    pub source: HintSource,
}

impl DelayHint {
    /// Parses a `Retry-After` header value given in seconds.
    ///
    /// HTTP-date values are not supported and yield `None`.
    pub fn from_retry_after(value: &str) -> Option<Self> {
        let seconds = value.trim().parse::<f64>().ok()?;
        Some(Self {
            delay: seconds_to_duration(seconds)?,
            source: HintSource::RetryAfterHeader,
        })
    }

    /// Parses a protobuf-JSON duration string such as `"5s"` or `"0.25s"`.
    pub fn from_retry_delay(value: &str) -> Option<Self> {
        Some(Self {
            delay: parse_unit_duration(value.trim())?,
            source: HintSource::RetryInfo,
        })
    }

    /// Scans an error message for `retry in <n>s` (case-insensitive).
    pub fn from_message(message: &str) -> Option<Self> {
        const MARKER: &str = "retry in ";
        let lower = message.to_ascii_lowercase();
        let start = lower.find(MARKER)? + MARKER.len();
        let rest = &lower[start..];

        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        let number = rest[..number_len].trim_end_matches('.');
        let unit = if rest[number_len..].starts_with("ms") {
            "ms"
        } else {
            "s"
        };

        Some(Self {
            delay: parse_unit_duration(&format!("{number}{unit}"))?,
            source: HintSource::Message,
        })
    }

    /// Extracts a hint from a rate-limit response.
    ///
    /// Priority: `Retry-After` header, then `RetryInfo` in the JSON error
    /// payload, then the error message text.
    pub fn from_response(headers: &HeaderMap, body: &str) -> Option<Self> {
        let from_header = headers
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(Self::from_retry_after);
        if from_header.is_some() {
            return from_header;
        }

        let envelope = serde_json::from_str::<wire::ErrorEnvelope>(body).ok()?;
        envelope
            .error
            .retry_delay()
            .and_then(Self::from_retry_delay)
            .or_else(|| Self::from_message(&envelope.error.message))
    }
}

fn parse_unit_duration(value: &str) -> Option<Duration> {
    if let Some(millis) = value.strip_suffix("ms") {
        let millis = millis.parse::<f64>().ok()?;
        return seconds_to_duration(millis / 1_000.0);
    }
    let seconds = value.strip_suffix('s')?.parse::<f64>().ok()?;
    seconds_to_duration(seconds)
}

fn seconds_to_duration(seconds: f64) -> Option<Duration> {
    if !seconds.is_finite() {
        return None;
    }
    Duration::try_from_secs_f64(seconds.max(0.0)).ok()
}
