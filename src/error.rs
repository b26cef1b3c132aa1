//! Error types for Klipp.

use thiserror::Error;

/// Library-level error type for Klipp operations.
#[derive(Error, Debug)]
pub enum KlippError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("No raw transcript found for video: {0}")]
    MissingTranscript(String),

    #[error("Invalid timestamp token: {0}")]
    InvalidTimestamp(String),

    #[error("Corrupt cache entry: {0}")]
    CacheCorrupt(String),

    #[error("Search backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Embedding dimension mismatch: index declares {expected}, got {actual}")]
    SchemaMismatch { expected: usize, actual: usize },

    #[error("Summarization failed: {0}")]
    Summarization(String),

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Index error: {0}")]
    Index(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),
}

/// Result type alias for Klipp operations.
pub type Result<T> = std::result::Result<T, KlippError>;
