mod env;
pub mod gemini;
mod provider;
mod provider_registry;
mod response_parsing;
pub mod sarvam;

pub use env::ApiKeySource;
pub use gemini::GeminiProvider;
pub use provider::LlmProvider;
pub use provider_registry::ProviderRegistry;
pub use sarvam::SarvamProvider;
