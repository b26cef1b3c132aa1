//! In-process lexical index with blob persistence.
//!
//! A BM25 index over the chunk text fields, with exact-match keyword
//! filters applied before scoring. The whole index (postings plus
//! documents) serializes to one opaque blob per namespace; a blob that
//! fails to deserialize is treated as corrupt and rebuilt wholly from the
//! namespace's cached chunk files.

use super::{IndexState, SearchHit, TranscriptIndex};
use crate::cache::{ChunkCache, Namespace};
use crate::chunking::Chunk;
use crate::error::{KlippError, Result};
use crate::summary::VideoCategory;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, instrument, warn};

const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;

/// Text fields scored by the index, in storage order.
const FIELD_COUNT: usize = 5;

fn field_texts(chunk: &Chunk) -> [&str; FIELD_COUNT] {
    [
        &chunk.title,
        &chunk.summary,
        &chunk.content,
        chunk.title_localized.as_deref().unwrap_or(""),
        chunk.summary_localized.as_deref().unwrap_or(""),
    ]
}

/// Split text into lowercase search terms.
///
/// Alphanumeric runs become word tokens; CJK codepoints are emitted as
/// single-character tokens, since the corpus is bilingual and CJK text
/// has no word boundaries to split on.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    let mut terms = Vec::new();
    let mut word = String::new();

    for c in text.chars() {
        if c.is_alphanumeric() && !is_cjk(c) {
            for lower in c.to_lowercase() {
                word.push(lower);
            }
        } else {
            if !word.is_empty() {
                terms.push(std::mem::take(&mut word));
            }
            if is_cjk(c) {
                terms.push(c.to_string());
            }
        }
    }
    if !word.is_empty() {
        terms.push(word);
    }

    terms
}

fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4E00}'..='\u{9FFF}' | '\u{3400}'..='\u{4DBF}')
}

/// Term postings for one text field.
#[derive(Debug, Default, Serialize, Deserialize)]
struct FieldPostings {
    /// term -> (document ordinal, term frequency) pairs.
    postings: HashMap<String, Vec<(u32, u32)>>,
    /// Token count per document ordinal.
    doc_len: Vec<u32>,
    avg_doc_len: f32,
}

impl FieldPostings {
    /// Index the next document's text; ordinals are assigned in call order.
    fn index_doc(&mut self, text: &str) {
        let ordinal = self.doc_len.len() as u32;
        let terms = tokenize(text);
        self.doc_len.push(terms.len() as u32);

        let mut freqs: HashMap<String, u32> = HashMap::new();
        for term in terms {
            *freqs.entry(term).or_default() += 1;
        }
        for (term, tf) in freqs {
            self.postings.entry(term).or_default().push((ordinal, tf));
        }
    }

    fn finish(&mut self) {
        let total: u64 = self.doc_len.iter().map(|&l| l as u64).sum();
        self.avg_doc_len = if self.doc_len.is_empty() {
            0.0
        } else {
            total as f32 / self.doc_len.len() as f32
        };
    }

    /// Accumulate BM25 scores for `terms` over the allowed documents.
    fn score_into(
        &self,
        terms: &[String],
        allowed: &[bool],
        total_docs: usize,
        scores: &mut HashMap<u32, f32>,
    ) {
        if self.avg_doc_len == 0.0 {
            return;
        }

        for term in terms {
            let Some(plist) = self.postings.get(term) else {
                continue;
            };
            let df = plist.len() as f32;
            let idf = (((total_docs as f32 - df + 0.5) / (df + 0.5)) + 1.0).ln();

            for &(doc, tf) in plist {
                if !allowed[doc as usize] {
                    continue;
                }
                let tf = tf as f32;
                let dl = self.doc_len[doc as usize] as f32;
                let norm = tf * (BM25_K1 + 1.0)
                    / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * dl / self.avg_doc_len));
                *scores.entry(doc).or_default() += idf * norm;
            }
        }
    }
}

/// Exact-match keyword filters, applied before any scoring.
#[derive(Debug, Clone, Default)]
pub struct SearchFilters {
    pub creator: Option<String>,
    pub category: Option<VideoCategory>,
}

impl SearchFilters {
    fn matches(&self, chunk: &Chunk) -> bool {
        if let Some(creator) = &self.creator {
            if &chunk.creator != creator {
                return false;
            }
        }
        if let Some(category) = self.category {
            if chunk.category != category {
                return false;
            }
        }
        true
    }
}

/// The serialized index: all documents plus per-field postings.
#[derive(Serialize, Deserialize)]
pub struct LexicalIndex {
    docs: Vec<Chunk>,
    fields: Vec<FieldPostings>,
    built_at: DateTime<Utc>,
}

impl LexicalIndex {
    /// Build an index over a set of chunks.
    pub fn build(chunks: Vec<Chunk>) -> Self {
        let mut fields: Vec<FieldPostings> =
            (0..FIELD_COUNT).map(|_| FieldPostings::default()).collect();

        for chunk in &chunks {
            for (field, text) in fields.iter_mut().zip(field_texts(chunk)) {
                field.index_doc(text);
            }
        }
        for field in &mut fields {
            field.finish();
        }

        Self {
            docs: chunks,
            fields,
            built_at: Utc::now(),
        }
    }

    /// Number of indexed documents.
    pub fn len(&self) -> usize {
        self.docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }

    /// Ranked query over the text fields, keyword filters first.
    pub fn search(&self, query: &str, filters: &SearchFilters, k: usize) -> Vec<SearchHit> {
        let terms = tokenize(query);
        if terms.is_empty() || self.docs.is_empty() {
            return Vec::new();
        }

        let allowed: Vec<bool> = self.docs.iter().map(|c| filters.matches(c)).collect();

        let mut scores: HashMap<u32, f32> = HashMap::new();
        for field in &self.fields {
            field.score_into(&terms, &allowed, self.docs.len(), &mut scores);
        }

        let mut ranked: Vec<(u32, f32)> = scores.into_iter().collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        ranked.truncate(k);

        ranked
            .into_iter()
            .map(|(ordinal, score)| {
                let chunk = &self.docs[ordinal as usize];
                SearchHit {
                    score,
                    video_id: chunk.video_id.clone(),
                    title: chunk.title.clone(),
                    start_time: chunk.start_time.clone(),
                    content: chunk.content.clone(),
                }
            })
            .collect()
    }
}

struct ManagerCell {
    state: IndexState,
    index: Option<Arc<LexicalIndex>>,
}

/// Loads, builds, and persists the lexical index for one namespace.
pub struct LexicalIndexManager {
    cache: Arc<ChunkCache>,
    namespace: Namespace,
    blob_path: PathBuf,
    cell: RwLock<ManagerCell>,
}

impl LexicalIndexManager {
    /// Create a manager; nothing is loaded until first access.
    pub fn new(cache: Arc<ChunkCache>, namespace: Namespace, index_dir: PathBuf) -> Self {
        let blob_path = index_dir.join(&namespace.creator).join(format!(
            "search_index_{}_{}{}.bin",
            namespace.window_size,
            namespace.step_size,
            namespace.variant.dir_suffix()
        ));

        Self {
            cache,
            namespace,
            blob_path,
            cell: RwLock::new(ManagerCell {
                state: IndexState::Uninitialized,
                index: None,
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> IndexState {
        self.cell
            .read()
            .map(|cell| cell.state)
            .unwrap_or(IndexState::Corrupted)
    }

    fn lock_err<T>(e: std::sync::PoisonError<T>) -> KlippError {
        KlippError::Index(format!("Failed to acquire index lock: {}", e))
    }

    fn load_blob(&self) -> Result<LexicalIndex> {
        let bytes = std::fs::read(&self.blob_path)?;
        serde_json::from_slice(&bytes)
            .map_err(|e| KlippError::Index(format!("{}: {}", self.blob_path.display(), e)))
    }

    fn build_and_persist(&self) -> Result<LexicalIndex> {
        let chunks = self.cache.load_all(&self.namespace)?;
        info!(
            "Building lexical index over {} chunks for namespace {}",
            chunks.len(),
            self.namespace.dir_name()
        );
        let index = LexicalIndex::build(chunks);
        self.persist(&index)?;
        Ok(index)
    }

    /// Write the blob to a temp file, then rename into place, so a reader
    /// never observes a half-written index.
    fn persist(&self, index: &LexicalIndex) -> Result<()> {
        let parent = self
            .blob_path
            .parent()
            .ok_or_else(|| KlippError::Index("Index blob path has no parent".to_string()))?;
        std::fs::create_dir_all(parent)?;

        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(&serde_json::to_vec(index)?)?;
        tmp.persist(&self.blob_path)
            .map_err(|e| KlippError::Index(format!("Failed to publish index blob: {}", e)))?;

        debug!("Persisted lexical index at {}", self.blob_path.display());
        Ok(())
    }

    #[instrument(skip(self))]
    fn load_or_build(&self) -> Result<Arc<LexicalIndex>> {
        {
            let cell = self.cell.read().map_err(Self::lock_err)?;
            if cell.state == IndexState::Ready {
                if let Some(index) = &cell.index {
                    return Ok(index.clone());
                }
            }
        }

        let mut cell = self.cell.write().map_err(Self::lock_err)?;
        if cell.state == IndexState::Ready {
            if let Some(index) = &cell.index {
                return Ok(index.clone());
            }
        }

        // Try the persisted blob first, unless a previous load already
        // flagged it corrupt.
        if cell.state != IndexState::Corrupted && self.blob_path.is_file() {
            match self.load_blob() {
                Ok(index) => {
                    info!(
                        "Loaded lexical index ({} docs) from {}",
                        index.len(),
                        self.blob_path.display()
                    );
                    let index = Arc::new(index);
                    cell.index = Some(index.clone());
                    cell.state = IndexState::Ready;
                    return Ok(index);
                }
                Err(e) => {
                    warn!("Corrupted index blob, rebuilding: {}", e);
                    cell.state = IndexState::Corrupted;
                }
            }
        }

        cell.state = IndexState::Building;
        match self.build_and_persist() {
            Ok(index) => {
                let index = Arc::new(index);
                cell.index = Some(index.clone());
                cell.state = IndexState::Ready;
                Ok(index)
            }
            Err(e) => {
                cell.state = IndexState::Uninitialized;
                Err(e)
            }
        }
    }
}

#[async_trait]
impl TranscriptIndex for LexicalIndexManager {
    async fn ensure_ready(&self) -> Result<()> {
        self.load_or_build().map(|_| ())
    }

    async fn rebuild(&self) -> Result<()> {
        let mut cell = self.cell.write().map_err(Self::lock_err)?;
        cell.state = IndexState::Building;
        match self.build_and_persist() {
            Ok(index) => {
                cell.index = Some(Arc::new(index));
                cell.state = IndexState::Ready;
                Ok(())
            }
            Err(e) => {
                cell.state = IndexState::Uninitialized;
                Err(e)
            }
        }
    }

    async fn search(&self, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        let index = self.load_or_build()?;
        let filters = SearchFilters {
            creator: Some(self.namespace.creator.clone()),
            category: None,
        };
        Ok(index.search(query, &filters, k))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LanguageVariant;

    fn chunk(video_id: &str, chunk_id: u32, content: &str) -> Chunk {
        Chunk {
            video_id: video_id.to_string(),
            creator: "mindy".to_string(),
            title: "Weekly Episode".to_string(),
            summary: "Another upload.".to_string(),
            category: VideoCategory::Skincare,
            title_localized: None,
            summary_localized: None,
            chunk_id,
            start_time: "0:00".to_string(),
            end_time: "0:45".to_string(),
            content: content.to_string(),
        }
    }

    fn namespace() -> Namespace {
        Namespace::new("mindy", 15, 3, LanguageVariant::Translated)
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("Hello, World!"), vec!["hello", "world"]);
        assert_eq!(tokenize("SPF50 plus"), vec!["spf50", "plus"]);
        assert_eq!(tokenize("防曬乳 review"), vec!["防", "曬", "乳", "review"]);
        assert!(tokenize("  ... ").is_empty());
    }

    #[test]
    fn test_search_ranks_by_relevance() {
        let index = LexicalIndex::build(vec![
            chunk("vid1", 1, "sunscreen sunscreen sunscreen all day"),
            chunk("vid1", 2, "a quick word about sunscreen here"),
            chunk("vid2", 1, "blush and eyeshadow only"),
        ]);

        let hits = index.search("sunscreen", &SearchFilters::default(), 10);
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score > hits[1].score);
        assert_eq!(hits[0].video_id, "vid1");

        // Strictly descending across the whole result list.
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_filters_apply_before_scoring() {
        let mut makeup = chunk("vid3", 1, "sunscreen mentioned in a makeup video");
        makeup.category = VideoCategory::Makeup;

        let index = LexicalIndex::build(vec![
            chunk("vid1", 1, "sunscreen for skincare"),
            makeup,
        ]);

        let filters = SearchFilters {
            creator: None,
            category: Some(VideoCategory::Skincare),
        };
        let hits = index.search("sunscreen", &filters, 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].video_id, "vid1");

        let filters = SearchFilters {
            creator: Some("someone_else".to_string()),
            category: None,
        };
        assert!(index.search("sunscreen", &filters, 10).is_empty());
    }

    #[test]
    fn test_matches_in_title_and_summary() {
        let mut titled = chunk("vid1", 1, "unrelated words");
        titled.title = "Sunscreen Review".to_string();
        titled.summary = "Comparing sunscreens for oily skin.".to_string();

        let index = LexicalIndex::build(vec![titled, chunk("vid2", 1, "other words")]);

        let hits = index.search("sunscreen review", &SearchFilters::default(), 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].video_id, "vid1");
    }

    #[test]
    fn test_empty_query_returns_nothing() {
        let index = LexicalIndex::build(vec![chunk("vid1", 1, "anything")]);
        assert!(index.search("", &SearchFilters::default(), 10).is_empty());
    }

    #[test]
    fn test_blob_round_trip() {
        let index = LexicalIndex::build(vec![
            chunk("vid1", 1, "sunscreen for oily skin"),
            chunk("vid2", 1, "powder and primer"),
        ]);

        let blob = serde_json::to_vec(&index).unwrap();
        let restored: LexicalIndex = serde_json::from_slice(&blob).unwrap();

        let before = index.search("sunscreen", &SearchFilters::default(), 5);
        let after = restored.search("sunscreen", &SearchFilters::default(), 5);
        assert_eq!(before.len(), after.len());
        assert_eq!(before[0].video_id, after[0].video_id);
        assert!((before[0].score - after[0].score).abs() < 1e-6);
    }

    fn seeded_manager(root: &std::path::Path) -> LexicalIndexManager {
        let cache = Arc::new(ChunkCache::new(root.join("cache")));
        let ns = namespace();
        cache
            .save(&ns.key("vid1"), &[chunk("vid1", 1, "sunscreen for oily skin")])
            .unwrap();
        cache
            .save(&ns.key("vid2"), &[chunk("vid2", 1, "a haircare routine")])
            .unwrap();
        LexicalIndexManager::new(cache, ns, root.join("index"))
    }

    #[tokio::test]
    async fn test_manager_builds_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let manager = seeded_manager(dir.path());

        assert_eq!(manager.state(), IndexState::Uninitialized);

        let hits = manager.search("sunscreen", 5).await.unwrap();
        assert_eq!(manager.state(), IndexState::Ready);
        assert!(!hits.is_empty());
        assert_eq!(hits[0].video_id, "vid1");

        assert!(manager.blob_path.is_file());
    }

    #[tokio::test]
    async fn test_manager_loads_existing_blob() {
        let dir = tempfile::tempdir().unwrap();

        // First manager builds and persists.
        seeded_manager(dir.path()).search("sunscreen", 5).await.unwrap();

        // Second manager loads the blob without rebuilding; emptying the
        // cache first proves the load path was used.
        let cache = Arc::new(ChunkCache::new(dir.path().join("empty_cache")));
        let manager = LexicalIndexManager::new(cache, namespace(), dir.path().join("index"));
        let hits = manager.search("sunscreen", 5).await.unwrap();
        assert!(!hits.is_empty());
    }

    #[tokio::test]
    async fn test_corrupted_blob_triggers_full_rebuild() {
        let dir = tempfile::tempdir().unwrap();
        let manager = seeded_manager(dir.path());
        manager.search("sunscreen", 5).await.unwrap();

        // Corrupt the persisted blob.
        std::fs::write(&manager.blob_path, "not an index").unwrap();

        let manager = seeded_manager(dir.path());
        let hits = manager.search("sunscreen", 5).await.unwrap();
        assert_eq!(manager.state(), IndexState::Ready);
        assert!(!hits.is_empty());

        // The rebuild republished a loadable blob.
        let bytes = std::fs::read(&manager.blob_path).unwrap();
        assert!(serde_json::from_slice::<LexicalIndex>(&bytes).is_ok());
    }

    #[tokio::test]
    async fn test_rebuild_picks_up_new_cache_entries() {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ChunkCache::new(dir.path().join("cache")));
        let ns = namespace();
        cache
            .save(&ns.key("vid1"), &[chunk("vid1", 1, "sunscreen basics")])
            .unwrap();

        let manager =
            LexicalIndexManager::new(cache.clone(), ns.clone(), dir.path().join("index"));
        manager.ensure_ready().await.unwrap();

        // Cached after the build: invisible until an explicit rebuild.
        cache
            .save(&ns.key("vid9"), &[chunk("vid9", 1, "retinol at night")])
            .unwrap();
        assert!(manager.search("retinol", 5).await.unwrap().is_empty());

        manager.rebuild().await.unwrap();
        let hits = manager.search("retinol", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].video_id, "vid9");
    }
}
