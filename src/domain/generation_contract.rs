use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::LlmError;

pub const PROMPT_REQUIRED_MESSAGE: &str = "Prompt is required";
pub const GENERATION_FAILED_MESSAGE: &str = "Failed to generate AI response";
pub const UNSUPPORTED_MODEL_MESSAGE: &str = "Unsupported model";

/// Caller-supplied prompt text. Blank input is rejected; the original text is
/// forwarded to providers untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt(String);

impl Prompt {
    pub fn parse(raw: impl Into<String>) -> Result<Self, LlmError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(LlmError::validation(PROMPT_REQUIRED_MESSAGE));
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSelector {
    #[default]
    Gemini,
    Sarvam,
}

impl ModelSelector {
    pub const ALL: [ModelSelector; 2] = [ModelSelector::Gemini, ModelSelector::Sarvam];

    /// Absent or blank names pick the default provider; unknown names are rejected.
    pub fn resolve(raw: Option<&str>) -> Result<Self, LlmError> {
        match raw.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(name) => name.parse(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gemini => "gemini",
            Self::Sarvam => "sarvam",
        }
    }
}

impl FromStr for ModelSelector {
    type Err = LlmError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "sarvam" => Ok(Self::Sarvam),
            _ => Err(LlmError::UnsupportedModel {
                model: value.trim().to_string(),
            }),
        }
    }
}

impl fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationOutcome {
    pub text: String,
    pub model: ModelSelector,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateRequestBody {
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl GenerateRequestBody {
    pub fn new(prompt: impl Into<String>, model: Option<ModelSelector>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            model: model.map(|model| model.as_str().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerateResponseBody {
    pub result: String,
    pub model: String,
}

impl From<GenerationOutcome> for GenerateResponseBody {
    fn from(outcome: GenerationOutcome) -> Self {
        Self {
            result: outcome.text,
            model: outcome.model.as_str().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponseBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponseBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: Some(details.into()),
        }
    }
}
