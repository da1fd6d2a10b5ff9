use std::time::{Duration, Instant};

use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::domain::{LlmError, ModelSelector, Prompt};

use super::LlmProvider;
use super::env::ApiKeySource;
use super::response_parsing::{extract_message_content, non_blank, truncate_message};

const PROVIDER_NAME: &str = "Sarvam";
pub const DEFAULT_BASE_URL: &str = "https://api.sarvam.ai";
pub const DEFAULT_MODEL: &str = "sarvam-m";
pub const DEFAULT_API_KEY_ENV: &str = "SARVAM_API_KEY";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

const SYSTEM_PROMPT: &str = "You are a helpful assistant.";
const TEMPERATURE: f32 = 0.7;
const API_KEY_HEADER: &str = "api-subscription-key";

pub struct SarvamProvider {
    api_key: ApiKeySource,
    api_base_url: String,
    model: String,
    client: Client,
}

impl SarvamProvider {
    pub fn with_config(
        api_key: ApiKeySource,
        api_base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let api_base_url = api_base_url.into();
        if api_base_url.trim().is_empty() {
            return Err(LlmError::config("Sarvam API base URL must not be empty"));
        }

        let model = model.into();
        let model = model.trim();
        if model.is_empty() {
            return Err(LlmError::config("Sarvam model must not be empty"));
        }

        let client = Client::builder().timeout(timeout).build().map_err(|err| {
            LlmError::internal(format!("failed to create Sarvam HTTP client: {err}"))
        })?;

        Ok(Self {
            api_key,
            api_base_url,
            model: model.to_string(),
            client,
        })
    }

    fn endpoint_url(&self) -> String {
        build_v1_url(&self.api_base_url, "chat/completions")
    }

    fn build_request_payload(&self, prompt: &Prompt) -> SarvamChatCompletionsRequest {
        SarvamChatCompletionsRequest {
            model: self.model.clone(),
            messages: vec![
                SarvamChatMessageRequest {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                SarvamChatMessageRequest {
                    role: "user".to_string(),
                    content: prompt.as_str().to_string(),
                },
            ],
            temperature: TEMPERATURE,
        }
    }

    fn map_success_response(&self, response_body: &str) -> Result<String, LlmError> {
        let response: SarvamChatCompletionsResponse = serde_json::from_str(response_body)
            .map_err(|err| {
                LlmError::invalid_response(format!("Sarvam response decode failed: {err}"))
            })?;

        response
            .choices
            .first()
            .and_then(SarvamChoice::extract_text)
            .ok_or_else(|| LlmError::empty_response(PROVIDER_NAME))
    }
}

impl LlmProvider for SarvamProvider {
    fn selector(&self) -> ModelSelector {
        ModelSelector::Sarvam
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn generate(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let api_key = self.api_key.resolve()?;
        let payload = self.build_request_payload(prompt);
        info!(model = %self.model, "Using Sarvam model");
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
            "Sarvam response received"
        );
        Ok(text)
    }
}

#[derive(Debug, Serialize)]
struct SarvamChatCompletionsRequest {
    model: String,
    messages: Vec<SarvamChatMessageRequest>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct SarvamChatMessageRequest {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct SarvamChatCompletionsResponse {
    #[serde(default)]
    choices: Vec<SarvamChoice>,
}

#[derive(Debug, Deserialize)]
struct SarvamChoice {
    #[serde(default)]
    message: Option<SarvamChoiceMessage>,
}

impl SarvamChoice {
    fn extract_text(&self) -> Option<String> {
        let content = self.message.as_ref()?.content.as_ref()?;
        extract_message_content(content)
    }
}

#[derive(Debug, Deserialize)]
struct SarvamChoiceMessage {
    #[serde(default)]
    content: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct SarvamErrorEnvelope {
    #[serde(default)]
    error: Option<SarvamErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct SarvamErrorDetail {
    #[serde(default)]
    message: String,
    #[serde(default)]
    code: Option<String>,
}

fn map_http_error(status: StatusCode, body: &str) -> LlmError {
    let detail = serde_json::from_str::<SarvamErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error);

    let message = detail
        .as_ref()
        .and_then(|detail| non_blank(&detail.message))
        .map(|message| match detail.as_ref().and_then(|d| d.code.as_deref()) {
            Some(code) if !code.trim().is_empty() => format!("{code}: {}", message.trim()),
            _ => message.trim().to_string(),
        })
        .unwrap_or_else(|| truncate_message(body));

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
        message: format!("Sarvam transport error: {error}"),
    }
}

fn build_v1_url(api_base_url: &str, endpoint_path: &str) -> String {
    let base = api_base_url.trim_end_matches('/');
    let endpoint_path = endpoint_path.trim_start_matches('/');

    if base.ends_with("/v1") {
        format!("{base}/{endpoint_path}")
    } else {
        format!("{base}/v1/{endpoint_path}")
    }
}

#[cfg(test)]
mod tests {
    use super::{SarvamProvider, build_v1_url, map_http_error};
    use crate::domain::{LlmError, Prompt};
    use crate::infra::llm::ApiKeySource;
    use reqwest::StatusCode;
    use std::time::Duration;

    fn provider() -> SarvamProvider {
        SarvamProvider::with_config(
            ApiKeySource::fixed("test-key"),
            "https://api.sarvam.ai",
            "sarvam-m",
            Duration::from_secs(2),
        )
        .expect("provider should build")
    }

    #[test]
    fn build_request_payload_uses_system_and_user_messages() {
        let prompt = Prompt::parse("namaste").expect("prompt should parse");
        let payload = provider().build_request_payload(&prompt);

        assert_eq!(payload.model, "sarvam-m");
        assert_eq!(payload.temperature, 0.7);
        assert_eq!(payload.messages.len(), 2);
        assert_eq!(payload.messages[0].role, "system");
        assert_eq!(payload.messages[1].role, "user");
        assert_eq!(payload.messages[1].content, "namaste");
    }

    #[test]
    fn map_success_response_reads_first_choice_content() {
        let response = r#"{
          "id": "chatcmpl_01",
          "choices": [
            { "index": 0, "finish_reason": "stop", "message": { "role": "assistant", "content": "Namaste! How can I help?" } },
            { "index": 1, "message": { "content": "ignored" } }
          ]
        }"#;

        let text = provider()
            .map_success_response(response)
            .expect("response mapping should succeed");

        assert_eq!(text, "Namaste! How can I help?");
    }

    #[test]
    fn map_success_response_reports_empty_choice_as_empty_response() {
        let error = provider()
            .map_success_response(r#"{"choices":[{"message":{"content":"  "}}]}"#)
            .expect_err("blank content should fail");
        assert!(matches!(
            error,
            LlmError::EmptyResponse { provider } if provider == "Sarvam"
        ));

        let error = provider()
            .map_success_response(r#"{"choices":[]}"#)
            .expect_err("missing choices should fail");
        assert!(matches!(error, LlmError::EmptyResponse { .. }));
    }

    #[test]
    fn map_success_response_rejects_non_json_body() {
        let error = provider()
            .map_success_response("<html>oops</html>")
            .expect_err("html should fail to decode");
        assert!(matches!(error, LlmError::InvalidResponse { .. }));
    }

    #[test]
    fn map_http_error_embeds_status_and_upstream_message() {
        let error = map_http_error(
            StatusCode::FORBIDDEN,
            r#"{"error":{"message":"Invalid API key","code":"invalid_api_key_error"}}"#,
        );

        assert!(matches!(
            error,
            LlmError::Provider { provider, status, message }
            if provider == "Sarvam" && status == 403 && message == "invalid_api_key_error: Invalid API key"
        ));

        let error = map_http_error(StatusCode::BAD_GATEWAY, "upstream\nunavailable");
        assert!(matches!(
            error,
            LlmError::Provider { status, message, .. }
            if status == 502 && message == "upstream unavailable"
        ));
    }

    #[test]
    fn with_config_rejects_blank_model() {
        let error = match SarvamProvider::with_config(
            ApiKeySource::fixed("test-key"),
            "https://api.sarvam.ai",
            " ",
            Duration::from_secs(2),
        ) {
            Ok(_) => panic!("blank model should fail"),
            Err(error) => error,
        };

        assert!(matches!(
            error,
            LlmError::Config { message } if message == "Sarvam model must not be empty"
        ));
    }

    #[test]
    fn build_v1_url_appends_v1_when_base_has_no_version_segment() {
        let url = build_v1_url("https://api.sarvam.ai", "chat/completions");
        assert_eq!(url, "https://api.sarvam.ai/v1/chat/completions");

        let url = build_v1_url("https://api.sarvam.ai/", "/chat/completions");
        assert_eq!(url, "https://api.sarvam.ai/v1/chat/completions");
    }

    #[test]
    fn build_v1_url_avoids_duplicate_v1_when_base_already_has_v1() {
        let url = build_v1_url("https://example.com/v1/", "chat/completions");
        assert_eq!(url, "https://example.com/v1/chat/completions");
    }
}
