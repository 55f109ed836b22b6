//! Error types for voxec.

use uuid::Uuid;

/// Top-level error type for the executive.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Audio error: {0}")]
    Audio(#[from] AudioError),

    #[error("Job error: {0}")]
    Job(#[from] JobError),

    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("No API credentials configured: {hint}")]
    NoCredentials { hint: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Model backend errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Backend {backend} request failed: {reason}")]
    RequestFailed { backend: String, reason: String },

    #[error("Backend {backend} rate limited")]
    RateLimited { backend: String },

    #[error("Invalid response from {backend}: {reason}")]
    InvalidResponse { backend: String, reason: String },

    #[error("Authentication failed for backend {backend}")]
    AuthFailed { backend: String },

    #[error("All {attempts} backends in the fallback chain failed")]
    ChainExhausted { attempts: usize },

    #[error("All {attempts} credentials exhausted for backend {backend}")]
    CredentialsExhausted { backend: String, attempts: usize },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl LlmError {
    /// True if the error signals quota/rate exhaustion, the one class that
    /// credential rotation can recover from.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Capture/render errors from the voice engine.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("Capture failed: {reason}")]
    CaptureFailed { reason: String },

    #[error("Render failed: {reason}")]
    RenderFailed { reason: String },

    #[error("Voice engine closed")]
    Closed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Background job errors.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("Job {id} failed: {reason}")]
    Failed { id: Uuid, reason: String },

    #[error("Failed to spawn {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("Job {id} process exited with code {code}")]
    NonZeroExit { id: Uuid, code: i32 },

    #[error("Job queue closed")]
    QueueClosed,

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Knowledge index errors.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("Index scan failed under {root}: {reason}")]
    ScanFailed { root: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the executive.
pub type Result<T> = std::result::Result<T, Error>;
