//! Elasticsearch-backed vector index.
//!
//! Talks to an Elasticsearch-compatible backend over its REST API: check
//! the collection, create it with an explicit schema, bulk-load embeddings
//! for every cached chunk, and run approximate k-NN queries. The bulk load
//! happens only when the collection is first created; videos cached
//! afterwards stay invisible to vector search until an explicit rebuild.
//!
//! The configured collection name is an alias. Documents are written to a
//! backing slot index and the alias is swapped in one `_aliases` call, so
//! readers never observe a half-built collection.

use super::{IndexState, SearchHit, TranscriptIndex};
use crate::cache::{ChunkCache, Namespace};
use crate::chunking::Chunk;
use crate::config::IndexSettings;
use crate::embedding::Embedder;
use crate::error::{KlippError, Result};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

/// Minimum k-NN candidate pool, protecting recall for small k.
const KNN_CANDIDATE_FLOOR: usize = 50;

/// Explicit collection schema: keyword fields for filtering, text fields
/// for inspection, and a cosine dense vector of the declared size.
fn mapping_body(dimensions: usize) -> Value {
    json!({
        "mappings": {
            "properties": {
                "video_id": {"type": "keyword"},
                "creator": {"type": "keyword"},
                "category": {"type": "keyword"},
                "title": {"type": "text"},
                "summary": {"type": "text"},
                "title_localized": {"type": "text"},
                "summary_localized": {"type": "text"},
                "content": {"type": "text"},
                "chunk_id": {"type": "integer"},
                "start_time": {"type": "keyword"},
                "end_time": {"type": "keyword"},
                "embedding": {
                    "type": "dense_vector",
                    "dims": dimensions,
                    "index": true,
                    "similarity": "cosine",
                },
            }
        }
    })
}

fn knn_body(embedding: &[f32], k: usize) -> Value {
    json!({
        "size": k,
        "knn": {
            "field": "embedding",
            "query_vector": embedding,
            "k": k,
            "num_candidates": KNN_CANDIDATE_FLOOR.max(k),
        },
    })
}

/// The backing slot a fresh build should go to: whichever of the two slot
/// indexes the alias does not currently point at.
fn next_slot(alias: &str, current: Option<&str>) -> String {
    let slot_a = format!("{}_a", alias);
    if current == Some(slot_a.as_str()) {
        format!("{}_b", alias)
    } else {
        slot_a
    }
}

/// One atomic `_aliases` request: point the alias at the new slot,
/// detaching it from the old one if any.
fn alias_actions(alias: &str, new_slot: &str, old_slot: Option<&str>) -> Value {
    let mut actions = Vec::new();
    if let Some(old) = old_slot {
        actions.push(json!({"remove": {"index": old, "alias": alias}}));
    }
    actions.push(json!({"add": {"index": new_slot, "alias": alias}}));
    json!({ "actions": actions })
}

/// Text embedded for a chunk: the localized title when present, else the
/// English one, followed by the chunk content.
fn embed_text(chunk: &Chunk) -> String {
    let title = chunk.title_localized.as_deref().unwrap_or(&chunk.title);
    format!("{} {}", title, chunk.content)
}

/// Deterministic document id, so a repeated bulk load upserts in place.
fn doc_id(chunk: &Chunk) -> String {
    format!("{}-{}-{}", chunk.creator, chunk.video_id, chunk.chunk_id)
}

fn check_dims(expected: usize, actual: usize) -> Result<()> {
    if actual != expected {
        return Err(KlippError::SchemaMismatch { expected, actual });
    }
    Ok(())
}

fn map_transport(e: reqwest::Error) -> KlippError {
    if e.is_connect() || e.is_timeout() {
        KlippError::BackendUnavailable(e.to_string())
    } else {
        KlippError::Http(e)
    }
}

async fn backend_error(context: &str, response: reqwest::Response) -> KlippError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    if status.is_server_error() {
        KlippError::BackendUnavailable(format!("{}: {} {}", context, status, body))
    } else {
        KlippError::Index(format!("{}: {} {}", context, status, body))
    }
}

/// Vector index backed by an external Elasticsearch-compatible backend.
pub struct ElasticIndex {
    client: reqwest::Client,
    endpoint: String,
    alias: String,
    dimensions: usize,
    max_concurrent: usize,
    namespace: Namespace,
    cache: Arc<ChunkCache>,
    embedder: Arc<dyn Embedder>,
    state: Mutex<IndexState>,
}

impl ElasticIndex {
    /// Create a manager for one collection; nothing is contacted until
    /// first access.
    pub fn new(
        settings: &IndexSettings,
        namespace: Namespace,
        cache: Arc<ChunkCache>,
        embedder: Arc<dyn Embedder>,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            alias: settings.collection.clone(),
            dimensions: embedder.dimensions(),
            max_concurrent: settings.max_concurrent_upserts.max(1),
            namespace,
            cache,
            embedder,
            state: Mutex::new(IndexState::Uninitialized),
        }
    }

    fn url(&self, name: &str) -> String {
        format!("{}/{}", self.endpoint, name)
    }

    /// The concrete slot index the alias currently points at, if any.
    async fn alias_target(&self) -> Result<Option<String>> {
        let response = self
            .client
            .get(format!("{}/_alias/{}", self.endpoint, self.alias))
            .send()
            .await
            .map_err(map_transport)?;

        match response.status().as_u16() {
            404 => Ok(None),
            200 => {
                let parsed: Value = response.json().await.map_err(map_transport)?;
                Ok(parsed
                    .as_object()
                    .and_then(|indexes| indexes.keys().next().cloned()))
            }
            _ => Err(backend_error("alias lookup failed", response).await),
        }
    }

    async fn create_slot(&self, slot: &str) -> Result<()> {
        let response = self
            .client
            .put(self.url(slot))
            .json(&mapping_body(self.dimensions))
            .send()
            .await
            .map_err(map_transport)?;

        if !response.status().is_success() {
            return Err(backend_error("collection create failed", response).await);
        }

        info!("Created index {} ({} dims, cosine)", slot, self.dimensions);
        Ok(())
    }

    async fn delete_slot(&self, slot: &str) -> Result<()> {
        let response = self
            .client
            .delete(self.url(slot))
            .send()
            .await
            .map_err(map_transport)?;

        // Absent is fine; this also clears leftovers of a crashed build.
        if !response.status().is_success() && response.status().as_u16() != 404 {
            return Err(backend_error("collection delete failed", response).await);
        }
        Ok(())
    }

    /// Atomically point the alias at the freshly built slot.
    async fn publish(&self, new_slot: &str, old_slot: Option<&str>) -> Result<()> {
        let response = self
            .client
            .post(format!("{}/_aliases", self.endpoint))
            .json(&alias_actions(&self.alias, new_slot, old_slot))
            .send()
            .await
            .map_err(map_transport)?;

        if !response.status().is_success() {
            return Err(backend_error("alias swap failed", response).await);
        }

        info!("Published {} as {}", new_slot, self.alias);
        Ok(())
    }

    /// Embed one chunk and upsert it under its deterministic id.
    async fn upsert_chunk(&self, slot: &str, chunk: &Chunk) -> Result<()> {
        let embedding = self.embedder.embed(&embed_text(chunk)).await?;
        check_dims(self.dimensions, embedding.len())?;

        let mut doc = serde_json::to_value(chunk)?;
        doc.as_object_mut()
            .expect("chunk serializes to an object")
            .insert("embedding".to_string(), json!(embedding));

        let response = self
            .client
            .put(format!("{}/_doc/{}", self.url(slot), doc_id(chunk)))
            .json(&doc)
            .send()
            .await
            .map_err(map_transport)?;

        if !response.status().is_success() {
            return Err(backend_error("document upsert failed", response).await);
        }

        debug!("Upserted {}", doc_id(chunk));
        Ok(())
    }

    /// Embed and upsert every chunk currently cached for the namespace,
    /// through a bounded worker pool, failing fast on the first error.
    async fn bulk_load(&self, slot: &str) -> Result<usize> {
        let chunks = self.cache.load_all(&self.namespace)?;
        if chunks.is_empty() {
            warn!(
                "No cached chunks for namespace {}; collection stays empty",
                self.namespace.dir_name()
            );
            return Ok(0);
        }

        let pb = ProgressBar::new(chunks.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  {spinner:.green} Indexing  [{bar:30.cyan/blue}] {pos}/{len}")
                .unwrap()
                .progress_chars("█▓░"),
        );

        let tasks: Vec<_> = chunks
            .iter()
            .map(|chunk| self.upsert_chunk(slot, chunk))
            .collect();
        let mut stream = stream::iter(tasks).buffer_unordered(self.max_concurrent);

        while let Some(result) = stream.next().await {
            pb.inc(1);
            if let Err(e) = result {
                pb.finish_and_clear();
                return Err(e);
            }
        }
        pb.finish_and_clear();

        // Make the freshly loaded documents searchable.
        let response = self
            .client
            .post(format!("{}/_refresh", self.url(slot)))
            .send()
            .await
            .map_err(map_transport)?;
        if !response.status().is_success() {
            return Err(backend_error("refresh failed", response).await);
        }

        Ok(chunks.len())
    }

    /// Build a slot and publish it. The only path that adds documents.
    async fn build_slot(&self, old_slot: Option<&str>) -> Result<usize> {
        let slot = next_slot(&self.alias, old_slot);
        self.delete_slot(&slot).await?;
        self.create_slot(&slot).await?;
        let loaded = self.bulk_load(&slot).await?;
        self.publish(&slot, old_slot).await?;
        Ok(loaded)
    }

    async fn initialize(&self) -> Result<()> {
        if self.alias_target().await?.is_some() {
            debug!("Collection {} already exists", self.alias);
            return Ok(());
        }

        let loaded = self.build_slot(None).await?;
        info!("Bulk-loaded {} chunks into {}", loaded, self.alias);
        Ok(())
    }
}

#[async_trait]
impl TranscriptIndex for ElasticIndex {
    #[instrument(skip(self))]
    async fn ensure_ready(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if *state == IndexState::Ready {
            return Ok(());
        }

        *state = IndexState::Building;
        match self.initialize().await {
            Ok(()) => {
                *state = IndexState::Ready;
                Ok(())
            }
            Err(e) => {
                *state = IndexState::Uninitialized;
                Err(e)
            }
        }
    }

    #[instrument(skip(self))]
    async fn rebuild(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        *state = IndexState::Building;

        let result = async {
            let current = self.alias_target().await?;
            let loaded = self.build_slot(current.as_deref()).await?;
            // Readers moved over at the alias swap; the stale slot can go.
            if let Some(old) = current {
                self.delete_slot(&old).await?;
            }
            Ok(loaded)
        }
        .await;

        match result {
            Ok(loaded) => {
                info!("Rebuilt collection {} with {} chunks", self.alias, loaded);
                *state = IndexState::Ready;
                Ok(())
            }
            Err(e) => {
                *state = IndexState::Uninitialized;
                Err(e)
            }
        }
    }

    #[instrument(skip(self))]
    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        self.ensure_ready().await?;

        // One embedding per query.
        let embedding = self.embedder.embed(query).await?;
        check_dims(self.dimensions, embedding.len())?;

        let response = self
            .client
            .post(format!("{}/_search", self.url(&self.alias)))
            .json(&knn_body(&embedding, k))
            .send()
            .await
            .map_err(map_transport)?;

        if !response.status().is_success() {
            return Err(backend_error("search failed", response).await);
        }

        let parsed: Value = response.json().await.map_err(map_transport)?;
        let hits = parsed
            .pointer("/hits/hits")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        let mut results = Vec::with_capacity(hits.len());
        for hit in hits {
            let source = |field: &str| {
                hit.pointer(&format!("/_source/{}", field))
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            };

            results.push(SearchHit {
                score: hit.pointer("/_score").and_then(Value::as_f64).unwrap_or(0.0) as f32,
                video_id: source("video_id"),
                title: source("title"),
                start_time: source("start_time"),
                content: source("content"),
            });
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::VideoCategory;

    fn chunk() -> Chunk {
        Chunk {
            video_id: "vid1".to_string(),
            creator: "mindy".to_string(),
            title: "Sunscreen Review".to_string(),
            summary: "Comparing sunscreens.".to_string(),
            category: VideoCategory::Skincare,
            title_localized: Some("防曬評比".to_string()),
            summary_localized: None,
            chunk_id: 3,
            start_time: "1:30".to_string(),
            end_time: "2:15".to_string(),
            content: "today we compare sunscreens".to_string(),
        }
    }

    #[test]
    fn test_mapping_declares_dimensions_and_similarity() {
        let body = mapping_body(384);
        assert_eq!(
            body.pointer("/mappings/properties/embedding/dims"),
            Some(&json!(384))
        );
        assert_eq!(
            body.pointer("/mappings/properties/embedding/similarity"),
            Some(&json!("cosine"))
        );
        assert_eq!(
            body.pointer("/mappings/properties/creator/type"),
            Some(&json!("keyword"))
        );
    }

    #[test]
    fn test_knn_candidate_floor() {
        let emb = vec![0.0f32; 4];

        let body = knn_body(&emb, 5);
        assert_eq!(body.pointer("/knn/num_candidates"), Some(&json!(50)));
        assert_eq!(body.pointer("/knn/k"), Some(&json!(5)));
        assert_eq!(body.pointer("/size"), Some(&json!(5)));

        let body = knn_body(&emb, 120);
        assert_eq!(body.pointer("/knn/num_candidates"), Some(&json!(120)));
    }

    #[test]
    fn test_slots_alternate() {
        assert_eq!(next_slot("chunks", None), "chunks_a");
        assert_eq!(next_slot("chunks", Some("chunks_a")), "chunks_b");
        assert_eq!(next_slot("chunks", Some("chunks_b")), "chunks_a");
    }

    #[test]
    fn test_alias_swap_is_one_request() {
        let body = alias_actions("chunks", "chunks_b", Some("chunks_a"));
        let actions = body.pointer("/actions").and_then(Value::as_array).unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(
            actions[0].pointer("/remove/index"),
            Some(&json!("chunks_a"))
        );
        assert_eq!(actions[1].pointer("/add/index"), Some(&json!("chunks_b")));

        let body = alias_actions("chunks", "chunks_a", None);
        let actions = body.pointer("/actions").and_then(Value::as_array).unwrap();
        assert_eq!(actions.len(), 1);
    }

    #[test]
    fn test_embed_text_prefers_localized_title() {
        let c = chunk();
        assert_eq!(embed_text(&c), "防曬評比 today we compare sunscreens");

        let mut plain = c;
        plain.title_localized = None;
        assert_eq!(
            embed_text(&plain),
            "Sunscreen Review today we compare sunscreens"
        );
    }

    #[test]
    fn test_doc_id_is_deterministic() {
        assert_eq!(doc_id(&chunk()), "mindy-vid1-3");
    }

    #[test]
    fn test_dimension_mismatch_is_schema_mismatch() {
        assert!(check_dims(384, 384).is_ok());
        assert!(matches!(
            check_dims(384, 1536),
            Err(KlippError::SchemaMismatch {
                expected: 384,
                actual: 1536
            })
        ));
    }
}
