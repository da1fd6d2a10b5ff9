use tracing::{debug, info};

use crate::domain::{GenerationOutcome, LlmError, ModelSelector, Prompt};
use crate::infra::llm::ProviderRegistry;

#[derive(Clone)]
pub struct GenerationService {
    registry: ProviderRegistry,
}

impl GenerationService {
    pub fn new(registry: ProviderRegistry) -> Self {
        Self { registry }
    }

    /// Validates the prompt before anything else, so a blank prompt never
    /// reaches provider resolution or an outbound call.
    pub fn generate(
        &self,
        prompt: &str,
        model: Option<&str>,
    ) -> Result<GenerationOutcome, LlmError> {
        let prompt = Prompt::parse(prompt)?;
        let selector = ModelSelector::resolve(model)?;

        let provider = self.registry.resolve(selector)?;
        debug!(model = %selector, provider_model = provider.model_name(), "dispatching prompt");

        let text = provider.generate(&prompt)?;
        info!(model = %selector, chars = text.chars().count(), "generation succeeded");

        Ok(GenerationOutcome {
            text,
            model: selector,
        })
    }
}
