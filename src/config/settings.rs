//! Configuration settings for Klipp.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
#[derive(Default)]
pub struct Settings {
    pub general: GeneralSettings,
    pub chunking: ChunkingSettings,
    pub summarization: SummarizationSettings,
    pub embedding: EmbeddingSettings,
    pub index: IndexSettings,
    pub search: SearchSettings,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralSettings {
    /// Directory holding raw transcripts (one subdirectory per creator).
    pub data_dir: String,
    /// Directory for cached chunk sets and persisted indexes.
    pub cache_dir: String,
    /// Creator namespace the CLI operates on.
    pub creator: String,
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for GeneralSettings {
    fn default() -> Self {
        Self {
            data_dir: "~/.klipp/data".to_string(),
            cache_dir: "~/.klipp/cache".to_string(),
            creator: "heyitsmindy".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Sliding-window chunking settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    /// Number of transcript entries per window.
    pub window_size: usize,
    /// Number of entries the window advances between chunks.
    pub step_size: usize,
    /// Which entry list is windowed: "translated" or "source".
    pub variant: String,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            window_size: crate::chunking::DEFAULT_WINDOW_SIZE,
            step_size: crate::chunking::DEFAULT_STEP_SIZE,
            variant: "translated".to_string(),
        }
    }
}

/// Summarization collaborator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizationSettings {
    /// LLM model used to summarize and categorize transcripts.
    pub model: String,
    /// Maximum summarization attempts before giving up (exponential backoff).
    pub max_retries: u32,
}

impl Default for SummarizationSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_retries: 3,
        }
    }
}

/// Embedding generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    /// Embedding model to use.
    pub model: String,
    /// Embedding dimensions; must match the index schema.
    pub dimensions: u32,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 384,
        }
    }
}

/// Index backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    /// Index backend ("lexical" or "elastic").
    pub backend: String,
    /// Endpoint of the external search backend (elastic only).
    pub endpoint: String,
    /// Collection (index name) in the external backend.
    pub collection: String,
    /// Maximum concurrent embed+upsert workers during a bulk build.
    pub max_concurrent_upserts: usize,
    /// Request timeout against the external backend, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            backend: "lexical".to_string(),
            endpoint: "http://localhost:9200".to_string(),
            collection: "transcript_chunks".to_string(),
            max_concurrent_upserts: 4,
            request_timeout_secs: 30,
        }
    }
}

/// Search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Default number of results to return.
    pub top_k: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self { top_k: 5 }
    }
}

impl Settings {
    /// Load settings from the default configuration file.
    pub fn load() -> crate::error::Result<Self> {
        Self::load_from(None)
    }

    /// Load settings from a specific path, or default location if None.
    pub fn load_from(path: Option<&PathBuf>) -> crate::error::Result<Self> {
        let config_path = match path {
            Some(p) => p.clone(),
            None => Self::default_config_path(),
        };

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let settings: Settings = toml::from_str(&content)?;
            Ok(settings)
        } else {
            Ok(Settings::default())
        }
    }

    /// Save settings to the default configuration file.
    pub fn save(&self) -> crate::error::Result<()> {
        self.save_to(&Self::default_config_path())
    }

    /// Save settings to a specific path.
    pub fn save_to(&self, path: &PathBuf) -> crate::error::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::KlippError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the default configuration file path.
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("klipp")
            .join("config.toml")
    }

    /// Expand shell variables in paths (e.g., ~).
    pub fn expand_path(path: &str) -> PathBuf {
        PathBuf::from(shellexpand::tilde(path).to_string())
    }

    /// Get the expanded raw-transcript data directory path.
    pub fn data_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.data_dir)
    }

    /// Get the expanded cache directory path.
    pub fn cache_dir(&self) -> PathBuf {
        Self::expand_path(&self.general.cache_dir)
    }

    /// Directory holding persisted lexical index blobs.
    pub fn index_dir(&self) -> PathBuf {
        self.cache_dir().join("search_tool")
    }
}
