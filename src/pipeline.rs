//! Transcript processing pipeline.
//!
//! Coordinates load → split → summarize → window → cache for one creator
//! namespace. Chunk sets are computed at most once per cache key; repeat
//! calls are served entirely from the cache.

use crate::cache::{CachedVideo, ChunkCache, LanguageVariant, Namespace};
use crate::chunking::{build_chunks, Chunk};
use crate::config::Settings;
use crate::error::{KlippError, Result};
use crate::summary::{OpenAiSummarizer, Summarizer, VideoSummary};
use crate::transcript::{split_transcript, TranscriptEntry, TranscriptStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// The transcript pipeline for one creator namespace.
pub struct TranscriptPipeline {
    store: TranscriptStore,
    cache: Arc<ChunkCache>,
    summarizer: Arc<dyn Summarizer>,
    namespace: Namespace,
    max_retries: u32,
}

impl TranscriptPipeline {
    /// Create a pipeline from settings, with the OpenAI summarizer.
    pub fn new(settings: &Settings) -> Result<Self> {
        let summarizer = Arc::new(OpenAiSummarizer::with_model(&settings.summarization.model));
        let store = TranscriptStore::new(settings.data_dir());
        let cache = Arc::new(ChunkCache::new(settings.cache_dir()));
        Self::with_components(settings, store, cache, summarizer)
    }

    /// Create a pipeline with custom components (used by tests).
    pub fn with_components(
        settings: &Settings,
        store: TranscriptStore,
        cache: Arc<ChunkCache>,
        summarizer: Arc<dyn Summarizer>,
    ) -> Result<Self> {
        let chunking = &settings.chunking;
        if chunking.window_size < 2 {
            return Err(KlippError::Config(format!(
                "window_size must be at least 2, got {}",
                chunking.window_size
            )));
        }
        if chunking.step_size == 0 {
            return Err(KlippError::Config("step_size must be positive".to_string()));
        }

        let variant: LanguageVariant = chunking
            .variant
            .parse()
            .map_err(KlippError::Config)?;

        let namespace = Namespace::new(
            settings.general.creator.clone(),
            chunking.window_size,
            chunking.step_size,
            variant,
        );

        Ok(Self {
            store,
            cache,
            summarizer,
            namespace,
            max_retries: settings.summarization.max_retries.max(1),
        })
    }

    /// The namespace this pipeline reads and writes.
    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    /// The chunk cache backing this pipeline.
    pub fn cache(&self) -> Arc<ChunkCache> {
        self.cache.clone()
    }

    /// Whether chunks for this video are already cached under the current
    /// processing parameters.
    pub fn has_cached(&self, video_id: &str) -> bool {
        self.cache.exists(&self.namespace.key(video_id))
    }

    /// Return the chunk set for a video, computing and caching it on first
    /// access. A corrupt cache entry is treated as absent and rebuilt.
    #[instrument(skip(self))]
    pub async fn get_or_build_chunks(&self, video_id: &str) -> Result<Vec<Chunk>> {
        let key = self.namespace.key(video_id);

        if self.cache.exists(&key) {
            match self.cache.load(&key) {
                Ok(chunks) => {
                    debug!("Serving {} chunks from cache for {}", chunks.len(), video_id);
                    return Ok(chunks);
                }
                Err(KlippError::CacheCorrupt(reason)) => {
                    warn!("Corrupt cache entry, reprocessing: {}", reason);
                }
                Err(e) => return Err(e),
            }
        }

        info!("Processing {}", video_id);

        let raw = self.store.load(&self.namespace.creator, video_id)?;
        let (entries, full_text) = split_transcript(&raw)?;

        let summary = self.summarize_with_backoff(&full_text, &entries).await?;

        let windowed: &[TranscriptEntry] = match self.namespace.variant {
            LanguageVariant::Translated => summary.translated_entries.as_deref().ok_or_else(|| {
                KlippError::Summarization(
                    "Summarizer returned no translated transcript".to_string(),
                )
            })?,
            LanguageVariant::Source => &entries,
        };

        let chunks = build_chunks(
            video_id,
            &self.namespace.creator,
            windowed,
            &summary,
            self.namespace.window_size,
            self.namespace.step_size,
        );

        self.cache.save(&key, &chunks)?;
        Ok(chunks)
    }

    /// List every cached video in this namespace with display metadata.
    pub fn list_cached_videos(&self) -> Result<Vec<CachedVideo>> {
        self.cache.list(&self.namespace)
    }

    /// The summarization collaborator assumes no internal retries, so the
    /// boundary adds exponential backoff.
    async fn summarize_with_backoff(
        &self,
        transcript: &str,
        entries: &[TranscriptEntry],
    ) -> Result<VideoSummary> {
        let mut delay = Duration::from_secs(1);
        let mut attempt = 1;

        loop {
            match self
                .summarizer
                .summarize(transcript, entries, self.namespace.variant)
                .await
            {
                Ok(summary) => return Ok(summary),
                Err(e) if attempt < self.max_retries => {
                    warn!(
                        "Summarization attempt {} failed, retrying in {:?}: {}",
                        attempt, delay, e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::VideoCategory;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Counts calls and echoes the input entries as the translation.
    struct CountingSummarizer {
        calls: AtomicU32,
        fail_first: u32,
    }

    impl CountingSummarizer {
        fn new() -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_first: 0,
            }
        }

        fn failing_first(n: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                fail_first: n,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Summarizer for CountingSummarizer {
        async fn summarize(
            &self,
            _transcript: &str,
            entries: &[TranscriptEntry],
            _variant: LanguageVariant,
        ) -> Result<VideoSummary> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.fail_first {
                return Err(KlippError::Summarization("flaky".to_string()));
            }
            Ok(VideoSummary {
                title: "Pinned Title".to_string(),
                summary: "Pinned summary.".to_string(),
                category: VideoCategory::Makeup,
                title_localized: None,
                summary_localized: None,
                translated_entries: Some(entries.to_vec()),
            })
        }
    }

    fn settings(data_dir: &std::path::Path, cache_dir: &std::path::Path) -> Settings {
        let mut settings = Settings::default();
        settings.general.data_dir = data_dir.to_string_lossy().into_owned();
        settings.general.cache_dir = cache_dir.to_string_lossy().into_owned();
        settings.general.creator = "mindy".to_string();
        settings.chunking.window_size = 2;
        settings.chunking.step_size = 1;
        settings
    }

    fn pipeline_with(
        settings: &Settings,
        summarizer: Arc<dyn Summarizer>,
    ) -> TranscriptPipeline {
        let store = TranscriptStore::new(settings.data_dir());
        let cache = Arc::new(ChunkCache::new(settings.cache_dir()));
        TranscriptPipeline::with_components(settings, store, cache, summarizer).unwrap()
    }

    fn write_transcript(data_dir: &std::path::Path, video_id: &str) {
        let dir = data_dir.join("mindy");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(format!("{}.txt", video_id)),
            "0:00 Hello\n0:05 World\n0:10 Again\n",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_summarizer_invoked_at_most_once() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir.path().join("data"), &dir.path().join("cache"));
        write_transcript(&settings.data_dir(), "vid1");

        let summarizer = Arc::new(CountingSummarizer::new());
        let pipeline = pipeline_with(&settings, summarizer.clone());

        assert!(!pipeline.has_cached("vid1"));

        let first = pipeline.get_or_build_chunks("vid1").await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].content, "Hello World");
        assert_eq!(first[1].content, "World Again");
        assert!(pipeline.has_cached("vid1"));

        let second = pipeline.get_or_build_chunks("vid1").await.unwrap();
        assert_eq!(second, first);
        assert_eq!(summarizer.calls(), 1);
    }

    #[tokio::test]
    async fn test_parameter_change_is_a_different_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let settings_a = settings(&dir.path().join("data"), &dir.path().join("cache"));
        write_transcript(&settings_a.data_dir(), "vid1");

        let pipeline_a = pipeline_with(&settings_a, Arc::new(CountingSummarizer::new()));
        pipeline_a.get_or_build_chunks("vid1").await.unwrap();

        let mut settings_b = settings_a.clone();
        settings_b.chunking.window_size = 3;
        settings_b.chunking.step_size = 2;
        let pipeline_b = pipeline_with(&settings_b, Arc::new(CountingSummarizer::new()));

        // Chunks cached under (2, 1) must not satisfy (3, 2).
        assert!(!pipeline_b.has_cached("vid1"));
    }

    #[tokio::test]
    async fn test_missing_transcript_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir.path().join("data"), &dir.path().join("cache"));

        let pipeline = pipeline_with(&settings, Arc::new(CountingSummarizer::new()));
        assert!(matches!(
            pipeline.get_or_build_chunks("ghost").await,
            Err(KlippError::MissingTranscript(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_cache_entry_is_reprocessed() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir.path().join("data"), &dir.path().join("cache"));
        write_transcript(&settings.data_dir(), "vid1");

        let summarizer = Arc::new(CountingSummarizer::new());
        let pipeline = pipeline_with(&settings, summarizer.clone());

        // Simulate a crash mid-write.
        let key = pipeline.namespace().key("vid1");
        let path = settings
            .cache_dir()
            .join(pipeline.namespace().dir_name())
            .join(key.file_name());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[{\"video_id\": \"vi").unwrap();

        let chunks = pipeline.get_or_build_chunks("vid1").await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(summarizer.calls(), 1);

        // The rewritten entry loads cleanly now.
        assert_eq!(pipeline.get_or_build_chunks("vid1").await.unwrap(), chunks);
        assert_eq!(summarizer.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_backoff_retries_summarization() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir.path().join("data"), &dir.path().join("cache"));
        write_transcript(&settings.data_dir(), "vid1");

        // Fails twice, succeeds on the third attempt; the paused clock
        // fast-forwards through the backoff sleeps.
        let summarizer = Arc::new(CountingSummarizer::failing_first(2));
        let pipeline = pipeline_with(&settings, summarizer.clone());

        let chunks = pipeline.get_or_build_chunks("vid1").await.unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(summarizer.calls(), 3);
    }

    #[tokio::test]
    async fn test_list_cached_videos() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(&dir.path().join("data"), &dir.path().join("cache"));
        write_transcript(&settings.data_dir(), "vid1");

        let pipeline = pipeline_with(&settings, Arc::new(CountingSummarizer::new()));
        assert!(pipeline.list_cached_videos().unwrap().is_empty());

        pipeline.get_or_build_chunks("vid1").await.unwrap();

        let videos = pipeline.list_cached_videos().unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].video_id, "vid1");
        assert_eq!(videos[0].title, "Pinned Title");
        assert_eq!(videos[0].url, "https://youtube.com/watch?v=vid1");
    }
}
