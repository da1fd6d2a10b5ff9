use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorCategory {
    UserActionRequired,
    ProviderFailure,
    InternalFailure,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LlmError {
    #[error("{message}")]
    Validation { message: String },
    #[error("model '{model}' is not supported (expected one of: gemini, sarvam)")]
    UnsupportedModel { model: String },
    #[error("API key configuration error: {message}")]
    Config { message: String },
    #[error("empty response from {provider}")]
    EmptyResponse { provider: String },
    #[error("{provider} API returned HTTP {status}: {message}")]
    Provider {
        provider: String,
        status: u16,
        message: String,
    },
    #[error("provider request timed out")]
    Timeout,
    #[error("provider transport failed: {message}")]
    Transport { message: String },
    #[error("provider returned an invalid response: {message}")]
    InvalidResponse { message: String },
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl LlmError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn empty_response(provider: impl Into<String>) -> Self {
        Self::EmptyResponse {
            provider: provider.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self::InvalidResponse {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    pub fn category(&self) -> LlmErrorCategory {
        match self {
            Self::Validation { .. } | Self::UnsupportedModel { .. } => {
                LlmErrorCategory::UserActionRequired
            }
            Self::EmptyResponse { .. }
            | Self::Provider { .. }
            | Self::Timeout
            | Self::Transport { .. }
            | Self::InvalidResponse { .. } => LlmErrorCategory::ProviderFailure,
            Self::Config { .. } | Self::Internal { .. } => LlmErrorCategory::InternalFailure,
        }
    }
}

/// Failures seen by the client while waiting for `/api/ai`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClientError {
    #[error("request aborted by user")]
    Aborted,
    #[error("server responded with HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("response body could not be decoded: {message}")]
    Decode { message: String },
    #[error("request could not be sent: {message}")]
    Transport { message: String },
}

impl ClientError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, Self::Aborted)
    }
}
