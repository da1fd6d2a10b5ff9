use crate::domain::{LlmError, ModelSelector, Prompt};

pub trait LlmProvider: Send + Sync {
    fn selector(&self) -> ModelSelector;

    fn model_name(&self) -> &str;

    fn generate(&self, prompt: &Prompt) -> Result<String, LlmError>;
}
