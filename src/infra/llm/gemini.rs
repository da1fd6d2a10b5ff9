use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::domain::{LlmError, ModelSelector, Prompt};

use super::LlmProvider;
use super::env::ApiKeySource;
use super::response_parsing::{non_blank, truncate_message};

const PROVIDER_NAME: &str = "Gemini";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiProvider {
    api_key: ApiKeySource,
    api_base_url: String,
    model: String,
    client: Client,
}

impl GeminiProvider {
    pub fn with_config(
        api_key: ApiKeySource,
        api_base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let api_base_url = api_base_url.into();
        if api_base_url.trim().is_empty() {
            return Err(LlmError::config("Gemini API base URL must not be empty"));
        }

        let model = model.into();
        let model = model.trim();
        if model.is_empty() {
            return Err(LlmError::config("Gemini model must not be empty"));
        }

        let client = Client::builder().timeout(timeout).build().map_err(|err| {
            LlmError::internal(format!("failed to create Gemini HTTP client: {err}"))
        })?;

        Ok(Self {
            api_key,
            api_base_url,
            model: model.to_string(),
            client,
        })
    }

    fn endpoint_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.api_base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn build_request_payload(&self, prompt: &Prompt) -> GeminiGenerateContentRequest {
        GeminiGenerateContentRequest {
            contents: vec![GeminiContentRequest {
                role: "user".to_string(),
                parts: vec![GeminiPartRequest {
                    text: prompt.as_str().to_string(),
                }],
            }],
        }
    }

    fn map_success_response(&self, response_body: &str) -> Result<String, LlmError> {
        let response: GeminiGenerateContentResponse = serde_json::from_str(response_body)
            .map_err(|err| {
                LlmError::invalid_response(format!("Gemini response decode failed: {err}"))
            })?;

        if let Some(text) = response.candidates.first().and_then(GeminiCandidate::text) {
            return Ok(text);
        }

        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
        {
            warn!(block_reason = reason, "Gemini blocked the prompt");
        }

        Err(LlmError::empty_response(PROVIDER_NAME))
    }
}

impl LlmProvider for GeminiProvider {
    fn selector(&self) -> ModelSelector {
        ModelSelector::Gemini
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn generate(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let api_key = self.api_key.resolve()?;
        let payload = self.build_request_payload(prompt);
        info!(model = %self.model, "Using Gemini model");
        let started = Instant::now();

        let response = self
            .client
            .post(self.endpoint_url())
            .header(API_KEY_HEADER, api_key)
            .header("content-type", "application/json")
            .json(&payload)
            .send()
            .map_err(map_transport_error)?;

        let status = response.status();
        let response_body = response.text().map_err(map_transport_error)?;
        if !status.is_success() {
            return Err(map_http_error(status, &response_body));
        }

        let text = self.map_success_response(&response_body)?;
        debug!(
            latency_ms = started.elapsed().as_millis() as u64,
            chars = text.chars().count(),
            "Gemini response received"
        );
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct GeminiGenerateContentRequest {
    contents: Vec<GeminiContentRequest>,
}

#[derive(Debug, Serialize)]
struct GeminiContentRequest {
    role: String,
    parts: Vec<GeminiPartRequest>,
}

#[derive(Debug, Serialize)]
struct GeminiPartRequest {
    text: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerateContentResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiCandidateContent>,
}

impl GeminiCandidate {
    fn text(&self) -> Option<String> {
        let joined = self
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|part| part.text.as_deref())
            .collect::<String>();
        non_blank(&joined)
    }
}

#[derive(Debug, Deserialize)]
struct GeminiCandidateContent {
    #[serde(default)]
    parts: Vec<GeminiCandidatePart>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    #[serde(default)]
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

fn map_http_error(status: StatusCode, body: &str) -> LlmError {
    let detail = serde_json::from_str::<GeminiErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error);

    let message = match detail {
        Some(GeminiErrorDetail {
            message,
            status: Some(upstream_status),
        }) if !message.trim().is_empty() => {
            format!("{upstream_status}: {}", message.trim())
        }
        Some(GeminiErrorDetail { message, .. }) if !message.trim().is_empty() => {
            message.trim().to_string()
        }
        _ => truncate_message(body),
    };

    LlmError::Provider {
        provider: PROVIDER_NAME.to_string(),
        status: status.as_u16(),
        message,
    }
}

fn map_transport_error(error: reqwest::Error) -> LlmError {
    if error.is_timeout() {
        return LlmError::Timeout;
    }

    LlmError::Transport {
        message: format!("Gemini transport error: {error}"),
    }
}

#[cfg(test)]
mod tests {
    use super::{GeminiProvider, map_http_error};
    use crate::domain::{LlmError, Prompt};
    use crate::infra::llm::ApiKeySource;
    use reqwest::StatusCode;
    use std::time::Duration;

    fn provider() -> GeminiProvider {
        GeminiProvider::with_config(
            ApiKeySource::fixed("test-key"),
            "https://generativelanguage.googleapis.com/",
            "gemini-2.5-flash",
            Duration::from_secs(2),
        )
        .expect("provider should build")
    }

    #[test]
    fn endpoint_url_targets_generate_content_for_model() {
        assert_eq!(
            provider().endpoint_url(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[test]
    fn build_request_payload_wraps_prompt_in_single_user_turn() {
        let prompt = Prompt::parse("hello").expect("prompt should parse");
        let payload = provider().build_request_payload(&prompt);
        let json = serde_json::to_value(&payload).expect("payload should serialize");

        assert_eq!(
            json,
            serde_json::json!({
                "contents": [{ "role": "user", "parts": [{ "text": "hello" }] }]
            })
        );
    }

    #[test]
    fn map_success_response_joins_candidate_parts() {
        let response = r#"{
          "candidates": [
            {
              "content": { "role": "model", "parts": [{ "text": "Hi " }, { "text": "there" }] },
              "finishReason": "STOP"
            }
          ],
          "usageMetadata": { "promptTokenCount": 1, "candidatesTokenCount": 2 }
        }"#;

        let text = provider()
            .map_success_response(response)
            .expect("response mapping should succeed");

        assert_eq!(text, "Hi there");
    }

    #[test]
    fn map_success_response_reports_blocked_prompt_as_empty_response() {
        let response = r#"{ "promptFeedback": { "blockReason": "SAFETY" } }"#;

        let error = provider()
            .map_success_response(response)
            .expect_err("blocked prompt should fail");

        assert!(matches!(
            error,
            LlmError::EmptyResponse { provider } if provider == "Gemini"
        ));
    }

    #[test]
    fn map_success_response_reads_only_the_first_candidate() {
        let response = r#"{
          "candidates": [
            { "content": { "role": "model", "parts": [] }, "finishReason": "SAFETY" },
            { "content": { "role": "model", "parts": [{ "text": "second" }] } }
          ]
        }"#;

        let error = provider()
            .map_success_response(response)
            .expect_err("empty first candidate should fail");

        assert!(matches!(
            error,
            LlmError::EmptyResponse { provider } if provider == "Gemini"
        ));
    }

    #[test]
    fn map_http_error_uses_upstream_status_and_message() {
        let error = map_http_error(
            StatusCode::BAD_REQUEST,
            r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#,
        );

        assert!(matches!(
            error,
            LlmError::Provider { provider, status, message }
            if provider == "Gemini" && status == 400 && message == "INVALID_ARGUMENT: API key not valid."
        ));
    }

    #[test]
    fn map_http_error_falls_back_to_truncated_body() {
        let error = map_http_error(StatusCode::SERVICE_UNAVAILABLE, "overloaded\n");

        assert!(matches!(
            error,
            LlmError::Provider { status, message, .. }
            if status == 503 && message == "overloaded"
        ));
    }
}
