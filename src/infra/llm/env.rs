use crate::domain::LlmError;

pub(crate) fn read_env_var(name: &str) -> Result<Option<String>, LlmError> {
    match std::env::var(name) {
        Ok(value) => Ok(Some(value)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(error) => Err(LlmError::config(format!("{name} could not be read: {error}"))),
    }
}

/// Where a provider finds its secret. Environment-backed keys are looked up on
/// every call so a missing key fails the request, not the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiKeySource {
    Env(String),
    Fixed(String),
}

impl ApiKeySource {
    pub fn env(name: impl Into<String>) -> Self {
        Self::Env(name.into())
    }

    pub fn fixed(key: impl Into<String>) -> Self {
        Self::Fixed(key.into())
    }

    pub fn resolve(&self) -> Result<String, LlmError> {
        match self {
            Self::Env(name) => match read_env_var(name)? {
                Some(value) if !value.trim().is_empty() => Ok(value.trim().to_string()),
                _ => Err(LlmError::config(format!("{name} is not set"))),
            },
            Self::Fixed(key) => {
                if key.trim().is_empty() {
                    return Err(LlmError::config("API key must not be empty"));
                }
                Ok(key.trim().to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiKeySource, read_env_var};
    use crate::domain::LlmError;

    const UNSET_VAR: &str = "AIBOT_TEST_DEFINITELY_UNSET_GEMINI_API_KEY";

    #[test]
    fn read_env_var_returns_none_for_missing_variable() {
        let value = read_env_var(UNSET_VAR).expect("missing variable should not error");
        assert_eq!(value, None);
    }

    #[test]
    fn env_source_reports_variable_name_when_missing() {
        let error = ApiKeySource::env(UNSET_VAR)
            .resolve()
            .expect_err("missing key should fail");

        assert!(matches!(
            error,
            LlmError::Config { message }
            if message == format!("{UNSET_VAR} is not set")
        ));
    }

    #[test]
    fn fixed_source_trims_and_rejects_blank_keys() {
        assert_eq!(
            ApiKeySource::fixed(" secret ")
                .resolve()
                .expect("fixed key should resolve"),
            "secret"
        );

        let error = ApiKeySource::fixed("  ")
            .resolve()
            .expect_err("blank key should fail");
        assert!(matches!(error, LlmError::Config { .. }));
    }
}
