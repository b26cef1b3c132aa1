//! Configuration module for Klipp.
//!
//! Handles loading and managing application settings.

mod settings;

pub use settings::{
    ChunkingSettings, EmbeddingSettings, GeneralSettings, IndexSettings, SearchSettings,
    Settings, SummarizationSettings,
};
