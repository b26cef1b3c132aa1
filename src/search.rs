//! Ranked query execution against the configured index backend.

use crate::cache::{ChunkCache, Namespace};
use crate::config::Settings;
use crate::embedding::Embedder;
use crate::error::Result;
use crate::index::{create_index, SearchHit, TranscriptIndex};
use std::sync::Arc;
use tracing::instrument;

/// Executes ranked queries against one index backend.
///
/// A service instance is bound to a single backend for its lifetime;
/// results from different backends are never blended.
pub struct SearchService {
    index: Box<dyn TranscriptIndex>,
}

impl SearchService {
    /// Wrap an existing index backend.
    pub fn new(index: Box<dyn TranscriptIndex>) -> Self {
        Self { index }
    }

    /// Build the configured backend for a creator namespace.
    pub fn from_settings(
        settings: &Settings,
        namespace: Namespace,
        cache: Arc<ChunkCache>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self> {
        Ok(Self::new(create_index(settings, namespace, cache, embedder)?))
    }

    /// Ranked search: at most `k` hits, strictly descending by score.
    #[instrument(skip(self))]
    pub async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        self.index.ensure_ready().await?;

        let mut hits = self.index.search(query, k).await?;
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(k);
        Ok(hits)
    }

    /// Force a full rebuild of the underlying index.
    pub async fn rebuild(&self) -> Result<()> {
        self.index.rebuild().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct ScrambledIndex;

    #[async_trait]
    impl TranscriptIndex for ScrambledIndex {
        async fn ensure_ready(&self) -> Result<()> {
            Ok(())
        }

        async fn rebuild(&self) -> Result<()> {
            Ok(())
        }

        async fn search(&self, _query: &str, _k: usize) -> Result<Vec<SearchHit>> {
            let hit = |score: f32, id: &str| SearchHit {
                score,
                video_id: id.to_string(),
                title: String::new(),
                start_time: "0:00".to_string(),
                content: String::new(),
            };
            Ok(vec![hit(0.2, "b"), hit(0.9, "a"), hit(0.5, "c"), hit(0.1, "d")])
        }
    }

    #[tokio::test]
    async fn test_hits_are_sorted_and_truncated() {
        let service = SearchService::new(Box::new(ScrambledIndex));

        let hits = service.search("anything", 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].video_id, "a");
        assert_eq!(hits[1].video_id, "c");
        assert_eq!(hits[2].video_id, "b");
        assert!(hits[0].score > hits[1].score && hits[1].score > hits[2].score);
    }
}
