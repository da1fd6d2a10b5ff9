use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::{LlmError, ModelSelector};

use super::LlmProvider;

#[derive(Default, Clone)]
pub struct ProviderRegistry {
    providers: HashMap<ModelSelector, Arc<dyn LlmProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P>(&mut self, provider: P) -> Result<(), LlmError>
    where
        P: LlmProvider + 'static,
    {
        self.register_shared(Arc::new(provider))
    }

    pub fn register_shared(&mut self, provider: Arc<dyn LlmProvider>) -> Result<(), LlmError> {
        let selector = provider.selector();
        if self.providers.contains_key(&selector) {
            return Err(LlmError::config(format!(
                "a provider for model '{selector}' is already registered"
            )));
        }

        self.providers.insert(selector, provider);
        Ok(())
    }

    pub fn resolve(&self, selector: ModelSelector) -> Result<Arc<dyn LlmProvider>, LlmError> {
        self.providers.get(&selector).cloned().ok_or_else(|| {
            LlmError::config(format!("no provider is registered for model '{selector}'"))
        })
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::ProviderRegistry;
    use crate::domain::{LlmError, ModelSelector, Prompt};
    use crate::infra::llm::LlmProvider;

    struct FakeProvider {
        selector: ModelSelector,
        reply: &'static str,
    }

    impl LlmProvider for FakeProvider {
        fn selector(&self) -> ModelSelector {
            self.selector
        }

        fn model_name(&self) -> &str {
            "fake-model"
        }

        fn generate(&self, _prompt: &Prompt) -> Result<String, LlmError> {
            Ok(self.reply.to_string())
        }
    }

    #[test]
    fn register_and_resolve_provider_for_selector() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(FakeProvider {
                selector: ModelSelector::Sarvam,
                reply: "namaste",
            })
            .expect("provider registration should succeed");

        let provider = registry
            .resolve(ModelSelector::Sarvam)
            .expect("provider should resolve");
        let prompt = Prompt::parse("hi").expect("prompt should parse");

        assert_eq!(
            provider.generate(&prompt).expect("provider should generate"),
            "namaste"
        );
        assert_eq!(registry.len(), 1);
        assert!(!registry.is_empty());
    }

    #[test]
    fn resolve_rejects_unregistered_selector() {
        let registry = ProviderRegistry::new();
        let error = registry
            .resolve(ModelSelector::Gemini)
            .err()
            .expect("unregistered selector should fail");

        assert!(matches!(
            error,
            LlmError::Config { message }
            if message == "no provider is registered for model 'gemini'"
        ));
    }

    #[test]
    fn register_rejects_duplicate_selector() {
        let mut registry = ProviderRegistry::new();
        registry
            .register(FakeProvider {
                selector: ModelSelector::Gemini,
                reply: "one",
            })
            .expect("first registration should succeed");

        let error = registry
            .register(FakeProvider {
                selector: ModelSelector::Gemini,
                reply: "two",
            })
            .expect_err("duplicate registration should fail");

        assert!(matches!(
            error,
            LlmError::Config { message }
            if message == "a provider for model 'gemini' is already registered"
        ));
    }
}
