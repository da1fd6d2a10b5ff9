//! Layered configuration for the `aibot` binary.
//!
//! Precedence, lowest to highest: built-in defaults, the TOML file, `AIBOT_`
//! environment variables (nested keys split on `__`), command line flags.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::app::GenerationService;
use crate::domain::{LlmError, ModelSelector};
use crate::infra::llm::{
    ApiKeySource, GeminiProvider, ProviderRegistry, SarvamProvider, gemini, sarvam,
};

pub const DEFAULT_CONFIG_FILE: &str = "aibot.toml";
pub const ENV_PREFIX: &str = "AIBOT_";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: SocketAddr,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

/// `format` is one of `pretty`, `compact` or `json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub gemini: ProviderConfig,
    pub sarvam: ProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            gemini: ProviderConfig {
                base_url: gemini::DEFAULT_BASE_URL.to_string(),
                model: gemini::DEFAULT_MODEL.to_string(),
                api_key_env: gemini::DEFAULT_API_KEY_ENV.to_string(),
                timeout_secs: gemini::DEFAULT_TIMEOUT.as_secs(),
            },
            sarvam: ProviderConfig {
                base_url: sarvam::DEFAULT_BASE_URL.to_string(),
                model: sarvam::DEFAULT_MODEL.to_string(),
                api_key_env: sarvam::DEFAULT_API_KEY_ENV.to_string(),
                timeout_secs: sarvam::DEFAULT_TIMEOUT.as_secs(),
            },
        }
    }
}

impl ProvidersConfig {
    /// Builds one provider per model selector. Keys are looked up per request,
    /// so a missing key does not prevent startup.
    pub fn build_registry(&self) -> Result<ProviderRegistry, LlmError> {
        let mut registry = ProviderRegistry::new();
        registry.register(GeminiProvider::with_config(
            ApiKeySource::env(&self.gemini.api_key_env),
            &self.gemini.base_url,
            &self.gemini.model,
            self.gemini.timeout(),
        )?)?;
        registry.register(SarvamProvider::with_config(
            ApiKeySource::env(&self.sarvam.api_key_env),
            &self.sarvam.base_url,
            &self.sarvam.model,
            self.sarvam.timeout(),
        )?)?;
        Ok(registry)
    }

    pub fn build_service(&self) -> Result<GenerationService, LlmError> {
        self.build_registry().map(GenerationService::new)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    pub model: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl ProviderConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn validate(&self, name: &str) -> Result<()> {
        if self.base_url.trim().is_empty() {
            bail!("providers.{name}.base_url must not be empty");
        }
        if self.model.trim().is_empty() {
            bail!("providers.{name}.model must not be empty");
        }
        if self.api_key_env.trim().is_empty() {
            bail!("providers.{name}.api_key_env must not be empty");
        }
        if self.timeout_secs == 0 {
            bail!("providers.{name}.timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

/// Flags that override file and environment values when set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub addr: Option<SocketAddr>,
    pub log_level: Option<String>,
}

#[derive(Debug, Default, Serialize)]
struct OverrideLayer {
    #[serde(skip_serializing_if = "Option::is_none")]
    server: Option<ServerOverride>,
    #[serde(skip_serializing_if = "Option::is_none")]
    logging: Option<LoggingOverride>,
}

#[derive(Debug, Serialize)]
struct ServerOverride {
    addr: SocketAddr,
}

#[derive(Debug, Serialize)]
struct LoggingOverride {
    level: String,
}

impl From<&CliOverrides> for OverrideLayer {
    fn from(overrides: &CliOverrides) -> Self {
        Self {
            server: overrides.addr.map(|addr| ServerOverride { addr }),
            logging: overrides
                .log_level
                .clone()
                .map(|level| LoggingOverride { level }),
        }
    }
}

impl AppConfig {
    pub fn figment(path: &Path, overrides: &CliOverrides) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(AppConfig::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .merge(Serialized::defaults(OverrideLayer::from(overrides)))
    }

    pub fn load(path: &Path, overrides: &CliOverrides) -> Result<Self> {
        let config: Self = Self::figment(path, overrides)
            .extract()
            .with_context(|| format!("failed to load configuration from {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.logging.format.as_str(), "pretty" | "compact" | "json") {
            bail!(
                "logging.format must be one of pretty, compact, json (got '{}')",
                self.logging.format
            );
        }
        self.providers.gemini.validate("gemini")?;
        self.providers.sarvam.validate("sarvam")?;
        Ok(())
    }
}

/// Installs the global subscriber. Output goes to stderr so that `ask` can
/// stream the answer on stdout. `RUST_LOG` wins over the configured level.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if config.level.trim().is_empty() {
            EnvFilter::new("info")
        } else {
            EnvFilter::new(config.level.clone())
        }
    });
    let registry = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        "compact" => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .compact()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
        _ => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .pretty()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init(),
    }
    .context("failed to install tracing subscriber")
}

#[derive(Parser, Debug, Clone)]
#[command(name = "aibot", version, about = "AI chat backend with Gemini and Sarvam providers")]
pub struct CliArgs {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server exposing POST /api/ai
    Serve(ServeArgs),
    /// Send one prompt to a running server and reveal the answer
    Ask(AskArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    #[arg(long, value_name = "ADDR")]
    pub addr: Option<SocketAddr>,

    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,
}

impl ServeArgs {
    pub fn overrides(&self) -> CliOverrides {
        CliOverrides {
            addr: self.addr,
            log_level: self.log_level.clone(),
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct AskArgs {
    pub prompt: String,

    /// gemini or sarvam; the server picks gemini when omitted
    #[arg(short, long, value_name = "MODEL")]
    pub model: Option<ModelSelector>,

    #[arg(long, value_name = "URL", default_value = "http://127.0.0.1:3000")]
    pub endpoint: String,

    #[arg(long, value_name = "SECS", default_value_t = 120)]
    pub timeout_secs: u64,

    #[arg(long, value_name = "LEVEL", default_value = "warn")]
    pub log_level: String,
}
