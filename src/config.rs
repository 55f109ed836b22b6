//! Configuration for voxec.
//!
//! All configuration comes from environment variables (with a `.env` file
//! loaded first if present). Credentials are held as [`SecretString`] so they
//! never appear in debug output.

use std::path::PathBuf;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Maximum number of numbered credential slots probed at startup
/// (`VOXEC_API_KEY_2` .. `VOXEC_API_KEY_10`).
const MAX_CREDENTIAL_SLOTS: u32 = 10;

/// Main configuration for the executive.
#[derive(Debug, Clone)]
pub struct Config {
    pub llm: LlmConfig,
    pub jobs: JobsConfig,
    pub agent: AgentConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Ok(Self {
            llm: LlmConfig::from_env()?,
            jobs: JobsConfig::from_env()?,
            agent: AgentConfig::from_env()?,
        })
    }
}

/// Model backend configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API credentials for the cloud backend, in rotation order.
    /// Loaded from `VOXEC_API_KEY` plus `VOXEC_API_KEY_2` .. `_10`.
    pub credentials: Vec<SecretString>,
    /// Base URL of the local fast backend (Ollama-compatible).
    pub local_url: String,
    /// Model name served by the local backend.
    pub local_model: String,
    /// Base URL of the cloud backend.
    pub cloud_url: String,
    /// Model name used on the cloud backend for chat and research.
    pub cloud_model: String,
}

impl LlmConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let mut credentials = Vec::new();
        if let Some(key) = optional_env("VOXEC_API_KEY")? {
            credentials.push(SecretString::from(key));
        }
        for i in 2..=MAX_CREDENTIAL_SLOTS {
            if let Some(key) = optional_env(&format!("VOXEC_API_KEY_{i}"))? {
                credentials.push(SecretString::from(key));
            }
        }
        if credentials.is_empty() {
            return Err(ConfigError::NoCredentials {
                hint: "set VOXEC_API_KEY (and optionally VOXEC_API_KEY_2..10) in the environment or .env".to_string(),
            });
        }

        Ok(Self {
            credentials,
            local_url: optional_env("VOXEC_LOCAL_URL")?
                .unwrap_or_else(|| "http://localhost:11434".to_string()),
            local_model: optional_env("VOXEC_LOCAL_MODEL")?
                .unwrap_or_else(|| "llama3.1".to_string()),
            cloud_url: optional_env("VOXEC_CLOUD_URL")?.unwrap_or_else(|| {
                "https://generativelanguage.googleapis.com/v1beta".to_string()
            }),
            cloud_model: optional_env("VOXEC_CLOUD_MODEL")?
                .unwrap_or_else(|| "gemini-2.0-flash".to_string()),
        })
    }
}

/// Background job configuration.
#[derive(Debug, Clone)]
pub struct JobsConfig {
    /// External coding agent binary.
    pub coder_bin: String,
    /// Ordered backend identifiers for the coder/researcher fallback chain.
    pub fallback_backends: Vec<String>,
    /// Project directory the coder and the knowledge index operate on.
    pub project_dir: PathBuf,
}

impl JobsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let fallback_backends = optional_env("VOXEC_FALLBACK_BACKENDS")?
            .unwrap_or_else(|| {
                "openrouter/deepseek/deepseek-r1:free,gemini/gemini-2.0-flash".to_string()
            })
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>();

        if fallback_backends.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "VOXEC_FALLBACK_BACKENDS".to_string(),
                message: "must name at least one backend identifier".to_string(),
            });
        }

        let project_dir = match optional_env("VOXEC_PROJECT_DIR")? {
            Some(dir) => PathBuf::from(dir),
            None => std::env::current_dir()?,
        };

        Ok(Self {
            coder_bin: optional_env("VOXEC_CODER_BIN")?.unwrap_or_else(|| "aider".to_string()),
            fallback_backends,
            project_dir,
        })
    }
}

/// Executive loop configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Total character cap on the rolling conversation context. Exceeding it
    /// discards the oldest half of the log.
    pub context_max_chars: usize,
    /// Captures with fewer trimmed characters than this are dropped.
    pub min_utterance_chars: usize,
}

impl AgentConfig {
    fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            context_max_chars: parse_optional_env("VOXEC_CONTEXT_MAX_CHARS", 2000)?,
            min_utterance_chars: parse_optional_env("VOXEC_MIN_UTTERANCE_CHARS", 2)?,
        })
    }
}

pub(crate) fn optional_env(key: &str) -> Result<Option<String>, ConfigError> {
    match std::env::var(key) {
        Ok(val) if val.is_empty() => Ok(None),
        Ok(val) => Ok(Some(val)),
        Err(std::env::VarError::NotPresent) => Ok(None),
        Err(e) => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            message: format!("failed to read: {e}"),
        }),
    }
}

pub(crate) fn parse_optional_env<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match optional_env(key)? {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        }),
        None => Ok(default),
    }
}
