use secrecy::Secret;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";

/// Default completion request timeout in seconds.
const DEFAULT_OPENAI_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone)]
pub struct ChatConfig {
    pub common: core_config::Config,
    pub openai: OpenAiConfig,
    pub mongodb: MongoConfig,
    /// Optional OTLP collector for span export.
    pub otlp_endpoint: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: Secret<String>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
    pub provider: CompletionBackend,
}

#[derive(Debug, Clone)]
pub struct MongoConfig {
    /// Connection string carrying the read-write credential.
    pub uri: Secret<String>,
    /// Connection string carrying a read-only credential. Falls back to `uri`.
    pub read_uri: Option<Secret<String>>,
    pub database: String,
    pub backend: StoreBackend,
}

/// Which completion client the service talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionBackend {
    OpenAi,
    Mock,
}

/// Which conversation store the service persists to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    MongoDb,
    Memory,
}

impl std::str::FromStr for CompletionBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(CompletionBackend::OpenAi),
            "mock" => Ok(CompletionBackend::Mock),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "Unknown COMPLETION_PROVIDER '{}'. Must be one of: openai, mock",
                other
            ))),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mongodb" | "mongo" => Ok(StoreBackend::MongoDb),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(AppError::ConfigError(anyhow::anyhow!(
                "Unknown STORE_BACKEND '{}'. Must be one of: mongodb, memory",
                other
            ))),
        }
    }
}

impl ChatConfig {
    pub fn load() -> Result<Self, AppError> {
        let common_config = core_config::Config::load()?;
        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let provider: CompletionBackend =
            get_env("COMPLETION_PROVIDER", Some("openai"), false)?.parse()?;
        let backend: StoreBackend = get_env("STORE_BACKEND", Some("mongodb"), false)?.parse()?;

        // The mock client and the in-memory store need no credentials.
        let api_key = match provider {
            CompletionBackend::OpenAi => get_env("OPENAI_API_KEY", None, is_prod)
                .map_err(|_| missing("OpenAI API key not configured"))?,
            CompletionBackend::Mock => env::var("OPENAI_API_KEY").unwrap_or_default(),
        };
        let uri = match backend {
            StoreBackend::MongoDb => get_env("MONGODB_URI", None, is_prod)
                .map_err(|_| missing("Database credentials not configured"))?,
            StoreBackend::Memory => env::var("MONGODB_URI").unwrap_or_default(),
        };

        Ok(ChatConfig {
            common: common_config,
            openai: OpenAiConfig {
                api_key: Secret::new(api_key),
                base_url: get_env("OPENAI_BASE_URL", Some(DEFAULT_OPENAI_BASE_URL), is_prod)?
                    .trim_end_matches('/')
                    .to_string(),
                model: get_env("OPENAI_MODEL", Some(DEFAULT_OPENAI_MODEL), is_prod)?,
                timeout_secs: get_env(
                    "OPENAI_TIMEOUT_SECS",
                    Some(&DEFAULT_OPENAI_TIMEOUT_SECS.to_string()),
                    is_prod,
                )?
                .parse()
                .unwrap_or(DEFAULT_OPENAI_TIMEOUT_SECS),
                provider,
            },
            mongodb: MongoConfig {
                uri: Secret::new(uri),
                read_uri: env::var("MONGODB_READ_URI")
                    .ok()
                    .filter(|v| !v.is_empty())
                    .map(Secret::new),
                database: get_env("MONGODB_DATABASE", Some("chat_db"), is_prod)?,
                backend,
            },
            otlp_endpoint: env::var("OTLP_ENDPOINT").ok().filter(|v| !v.is_empty()),
        })
    }

    /// Configuration for tests and local runs: mock completions, in-memory
    /// store, random port.
    pub fn in_memory() -> Self {
        ChatConfig {
            common: core_config::Config {
                port: 0,
                ..Default::default()
            },
            openai: OpenAiConfig {
                api_key: Secret::new(String::new()),
                base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
                model: DEFAULT_OPENAI_MODEL.to_string(),
                timeout_secs: DEFAULT_OPENAI_TIMEOUT_SECS,
                provider: CompletionBackend::Mock,
            },
            mongodb: MongoConfig {
                uri: Secret::new(String::new()),
                read_uri: None,
                database: "chat_db".to_string(),
                backend: StoreBackend::Memory,
            },
            otlp_endpoint: None,
        }
    }
}

fn missing(message: &str) -> AppError {
    AppError::ConfigError(anyhow::anyhow!(message.to_string()))
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required in production but not set",
                    key
                )))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(
                    "{} is required but not set",
                    key
                )))
            }
        }
    }
}
