use reqwest::{header::HeaderMap, StatusCode};

use crate::{
    wire::{self, Content, GenerateContentRequest, GenerationConfig, Part},
    DelayHint, GenerateRequest, Generation, Passage, PromptError, Usage,
};

pub(crate) fn build_generate_request(request: &GenerateRequest) -> GenerateContentRequest<'_> {
    let contents = request
        .turns
        .iter()
        .map(|turn| Content {
            role: Some(turn.role.as_str()),
            parts: vec![Part { text: &turn.text }],
        })
        .collect();

    let system_instruction = request.system_instruction.as_deref().map(|text| Content {
        role: None,
        parts: vec![Part { text }],
    });

    let has_config = request.temperature.is_some()
        || request.max_output_tokens.is_some()
        || request.response_mime_type.is_some();
    let generation_config = has_config.then(|| GenerationConfig {
        temperature: request.temperature,
        max_output_tokens: request.max_output_tokens,
        response_mime_type: request.response_mime_type.as_deref(),
    });

    GenerateContentRequest {
        contents,
        system_instruction,
        generation_config,
    }
}

pub(crate) fn decode_generation(
    response: wire::GenerateContentResponse,
) -> Result<Generation, PromptError> {
    if let Some(reason) = response
        .prompt_feedback
        .and_then(|feedback| feedback.block_reason)
    {
        return Err(PromptError::Blocked { reason });
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| PromptError::Decode("response contains no candidates".to_owned()))?;

    let text: String = candidate
        .content
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    if text.is_empty() {
        return Err(PromptError::Decode(format!(
            "candidate has no text (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        )));
    }

    Ok(Generation {
        text,
        finish_reason: candidate.finish_reason,
        usage: response.usage_metadata.map(|usage| Usage {
            prompt_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
            total_tokens: usage.total_token_count,
        }),
        model_version: response.model_version,
    })
}

/// Maps a non-success response to the error taxonomy.
///
/// Only `429` is retryable; its hint comes from headers or the error body.
pub(crate) fn decode_failure(status: StatusCode, headers: &HeaderMap, body: String) -> PromptError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        let hint = DelayHint::from_response(headers, &body);
        let message = serde_json::from_str::<wire::ErrorEnvelope>(&body)
            .ok()
            .map(|envelope| envelope.error.message)
            .filter(|message| !message.is_empty())
            .unwrap_or(body);
        return PromptError::RateLimited { hint, message };
    }

    PromptError::Http {
        status: status.as_u16(),
        body,
    }
}

pub(crate) fn decode_passages(response: wire::SearchResponse, k: usize) -> Vec<Passage> {
    response
        .query
        .map(|query| query.search)
        .unwrap_or_default()
        .into_iter()
        .take(k)
        .map(|hit| Passage {
            title: hit.title,
            text: strip_markup(&hit.snippet),
        })
        .collect()
}

/// Removes HTML tags and decodes the handful of entities search snippets use.
pub(crate) fn strip_markup(snippet: &str) -> String {
    let mut text = String::with_capacity(snippet.len());
    let mut in_tag = false;
    for ch in snippet.chars() {
        match ch {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => text.push(ch),
            _ => {}
        }
    }

    let decoded = text
        .replace("&quot;", "\"")
        .replace("&#039;", "'")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use reqwest::{
        header::{HeaderMap, HeaderValue, RETRY_AFTER},
        StatusCode,
    };
    use serde_json::json;

    use crate::{decode, wire, GenerateRequest, HintSource, PromptError};

    #[test]
    fn request_serializes_in_camel_case() {
        let request = GenerateRequest::user("hi")
            .with_system("sys")
            .with_temperature(0.5)
            .json_output();
        let body = serde_json::to_value(decode::build_generate_request(&request))
            .expect("must serialize");

        assert_eq!(body["contents"][0]["role"], "user");
        assert_eq!(body["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "sys");
        assert!(body["systemInstruction"].get("role").is_none());
        assert_eq!(body["generationConfig"]["temperature"], 0.5);
        assert_eq!(
            body["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert!(body["generationConfig"].get("maxOutputTokens").is_none());
    }

    #[test]
    fn request_without_config_omits_generation_config() {
        let body = serde_json::to_value(decode::build_generate_request(&GenerateRequest::user(
            "hi",
        )))
        .expect("must serialize");
        assert!(body.get("generationConfig").is_none());
        assert!(body.get("systemInstruction").is_none());
    }

    #[test]
    fn generation_joins_parts_and_usage() {
        let response: wire::GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "role": "model", "parts": [{ "text": "Hello, " }, { "text": "world" }] },
                "finishReason": "STOP"
            }],
            "usageMetadata": { "promptTokenCount": 3, "candidatesTokenCount": 2, "totalTokenCount": 5 },
            "modelVersion": "gemini-2.5-flash"
        }))
        .expect("must deserialize");

        let generation = decode::decode_generation(response).expect("must decode");
        assert_eq!(generation.text, "Hello, world");
        assert_eq!(generation.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(generation.usage.map(|usage| usage.total_tokens), Some(5));
    }

    #[test]
    fn blocked_prompt_is_reported() {
        let response: wire::GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .expect("must deserialize");

        let err = decode::decode_generation(response).expect_err("must fail");
        assert!(matches!(err, PromptError::Blocked { reason } if reason == "SAFETY"));
    }

    #[test]
    fn empty_candidate_is_decode_error() {
        let response: wire::GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "finishReason": "MAX_TOKENS" }]
        }))
        .expect("must deserialize");

        let err = decode::decode_generation(response).expect_err("must fail");
        assert!(matches!(err, PromptError::Decode(message) if message.contains("MAX_TOKENS")));
    }

    #[test]
    fn too_many_requests_becomes_rate_limited() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("2"));
        let body = json!({
            "error": { "code": 429, "message": "Resource has been exhausted", "status": "RESOURCE_EXHAUSTED" }
        })
        .to_string();

        match decode::decode_failure(StatusCode::TOO_MANY_REQUESTS, &headers, body) {
            PromptError::RateLimited { hint, message } => {
                let hint = hint.expect("header hint must be present");
                assert_eq!(hint.delay, Duration::from_secs(2));
                assert_eq!(hint.source, HintSource::RetryAfterHeader);
                assert_eq!(message, "Resource has been exhausted");
            }
            other => panic!("expected rate limited, got {other:?}"),
        }
    }

    #[test]
    fn rate_limit_with_plain_body_keeps_body_as_message() {
        match decode::decode_failure(
            StatusCode::TOO_MANY_REQUESTS,
            &HeaderMap::new(),
            "slow down".to_owned(),
        ) {
            PromptError::RateLimited { hint, message } => {
                assert!(hint.is_none());
                assert_eq!(message, "slow down");
            }
            other => panic!("expected rate limited, got {other:?}"),
        }
    }

    #[test]
    fn other_statuses_are_http_errors() {
        let err = decode::decode_failure(
            StatusCode::SERVICE_UNAVAILABLE,
            &HeaderMap::new(),
            "overloaded".to_owned(),
        );
        assert!(matches!(err, PromptError::Http { status: 503, .. }));
    }

    #[test]
    fn strip_markup_removes_tags_and_entities() {
        assert_eq!(
            decode::strip_markup(
                "<span class=\"searchmatch\">David</span> Gregory &amp; the  castle of &quot;Kinnairdy&quot;"
            ),
            "David Gregory & the castle of \"Kinnairdy\""
        );
    }

    #[test]
    fn passages_are_truncated_to_k() {
        let response: wire::SearchResponse = serde_json::from_value(json!({
            "query": { "search": [
                { "title": "A", "snippet": "<b>a</b>" },
                { "title": "B", "snippet": "b" },
                { "title": "C", "snippet": "c" }
            ]}
        }))
        .expect("must deserialize");

        let passages = decode::decode_passages(response, 2);
        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].title, "A");
        assert_eq!(passages[0].text, "a");
    }
}
