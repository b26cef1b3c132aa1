//! Queryable index over a creator's cached chunk sets.
//!
//! Two backends share one contract: an in-process lexical index persisted
//! as a blob, and an external vector-similarity backend. The backend is
//! selected by configuration at construction and fixed for the instance's
//! lifetime; results from the two are never blended.

mod elastic;
mod lexical;

pub use elastic::ElasticIndex;
pub use lexical::{LexicalIndex, LexicalIndexManager, SearchFilters};

use crate::cache::{ChunkCache, Namespace};
use crate::config::Settings;
use crate::embedding::Embedder;
use crate::error::{KlippError, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

/// Index backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexBackend {
    /// In-process text-relevance index persisted as a blob.
    Lexical,
    /// External approximate k-NN backend over chunk embeddings.
    Elastic,
}

impl std::str::FromStr for IndexBackend {
    type Err = KlippError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "lexical" | "minsearch" => Ok(IndexBackend::Lexical),
            "elastic" | "elasticsearch" | "vector" => Ok(IndexBackend::Elastic),
            _ => Err(KlippError::Config(format!("Unknown index backend: {}", s))),
        }
    }
}

impl std::fmt::Display for IndexBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexBackend::Lexical => write!(f, "lexical"),
            IndexBackend::Elastic => write!(f, "elastic"),
        }
    }
}

/// Lifecycle of a namespace index.
///
/// `Ready → Corrupted` happens on a failed load; the next access forces a
/// full rebuild. A building index is never visible to readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexState {
    Uninitialized,
    Building,
    Ready,
    Corrupted,
}

/// A ranked snippet returned from a search.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub score: f32,
    pub video_id: String,
    pub title: String,
    pub start_time: String,
    pub content: String,
}

/// Trait for index backend implementations.
#[async_trait]
pub trait TranscriptIndex: Send + Sync {
    /// Build or load the index if it is not already ready.
    async fn ensure_ready(&self) -> Result<()>;

    /// Discard any existing index and rebuild it wholly from the
    /// namespace's cached chunk sets.
    async fn rebuild(&self) -> Result<()>;

    /// Ranked query: at most `k` hits, descending by score.
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>>;
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// Create the configured index backend for a creator namespace.
pub fn create_index(
    settings: &Settings,
    namespace: Namespace,
    cache: Arc<ChunkCache>,
    embedder: Arc<dyn Embedder>,
) -> Result<Box<dyn TranscriptIndex>> {
    match settings.index.backend.parse()? {
        IndexBackend::Lexical => Ok(Box::new(LexicalIndexManager::new(
            cache,
            namespace,
            settings.index_dir(),
        ))),
        IndexBackend::Elastic => Ok(Box::new(ElasticIndex::new(
            &settings.index,
            namespace,
            cache,
            embedder,
        ))),
    }
}
