//! Durable chunk-set cache keyed by processing parameters.
//!
//! One JSON file per (creator, video, window, step, variant). Every key
//! component is embedded in the storage path, so distinct keys can never
//! share a location, and presence of a file is the sole idempotence signal.

use crate::chunking::Chunk;
use crate::error::{KlippError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Which entry list a chunk set was built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LanguageVariant {
    /// Windows the summarizer's translated transcript entries.
    #[default]
    Translated,
    /// Windows the source-language entries, carrying localized metadata.
    Source,
}

impl LanguageVariant {
    /// Namespace directory suffix. The translated variant keeps the bare name.
    pub fn dir_suffix(&self) -> &'static str {
        match self {
            LanguageVariant::Translated => "",
            LanguageVariant::Source => "_source",
        }
    }
}

impl std::str::FromStr for LanguageVariant {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "translated" => Ok(LanguageVariant::Translated),
            "source" => Ok(LanguageVariant::Source),
            _ => Err(format!("Unknown language variant: {}", s)),
        }
    }
}

impl std::fmt::Display for LanguageVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LanguageVariant::Translated => write!(f, "translated"),
            LanguageVariant::Source => write!(f, "source"),
        }
    }
}

/// One cache/index partition: a creator plus its processing parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub creator: String,
    pub window_size: usize,
    pub step_size: usize,
    pub variant: LanguageVariant,
}

impl Namespace {
    pub fn new(
        creator: impl Into<String>,
        window_size: usize,
        step_size: usize,
        variant: LanguageVariant,
    ) -> Self {
        Self {
            creator: creator.into(),
            window_size,
            step_size,
            variant,
        }
    }

    /// Directory name of this namespace under the cache root.
    pub fn dir_name(&self) -> String {
        format!(
            "{}_{}_{}{}",
            self.creator,
            self.window_size,
            self.step_size,
            self.variant.dir_suffix()
        )
    }

    /// Cache key for one video in this namespace.
    pub fn key(&self, video_id: &str) -> CacheKey {
        CacheKey {
            namespace: self.clone(),
            video_id: video_id.to_string(),
        }
    }
}

/// Identifies one persisted chunk set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    pub namespace: Namespace,
    pub video_id: String,
}

impl CacheKey {
    /// File name of the persisted chunk set within its namespace directory.
    pub fn file_name(&self) -> String {
        format!("{}_{}.json", self.namespace.creator, self.video_id)
    }
}

/// Display metadata for one cached video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedVideo {
    pub video_id: String,
    pub title: String,
    pub summary: String,
    pub url: String,
}

/// File-backed chunk cache.
///
/// Entries are write-once with no TTL or eviction; they persist until an
/// operator deletes them.
pub struct ChunkCache {
    root: PathBuf,
}

impl ChunkCache {
    /// Create a cache rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn namespace_dir(&self, namespace: &Namespace) -> PathBuf {
        self.root.join(namespace.dir_name())
    }

    fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.namespace_dir(&key.namespace).join(key.file_name())
    }

    /// Whether a chunk set is persisted for this key.
    pub fn exists(&self, key: &CacheKey) -> bool {
        self.entry_path(key).is_file()
    }

    /// Load the persisted chunk set for a key.
    ///
    /// Any payload that is not a JSON array of chunk records (wrong shape,
    /// missing required fields, truncated write) is `CacheCorrupt`.
    pub fn load(&self, key: &CacheKey) -> Result<Vec<Chunk>> {
        let path = self.entry_path(key);
        let payload = std::fs::read_to_string(&path)?;

        let chunks: Vec<Chunk> = serde_json::from_str(&payload)
            .map_err(|e| KlippError::CacheCorrupt(format!("{}: {}", path.display(), e)))?;

        debug!("Loaded {} chunks from {}", chunks.len(), path.display());
        Ok(chunks)
    }

    /// Persist a chunk set as one unit.
    pub fn save(&self, key: &CacheKey, chunks: &[Chunk]) -> Result<()> {
        let path = self.entry_path(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let payload = serde_json::to_string_pretty(chunks)?;
        std::fs::write(&path, payload)?;

        info!("Cached {} chunks at {}", chunks.len(), path.display());
        Ok(())
    }

    /// List cached videos in a namespace with display metadata.
    ///
    /// Reads only the first chunk of each file; the video id is derived from
    /// the file name. Unparseable files are skipped with a warning so one bad
    /// entry doesn't hide the rest of the listing.
    pub fn list(&self, namespace: &Namespace) -> Result<Vec<CachedVideo>> {
        let dir = self.namespace_dir(namespace);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let prefix = format!("{}_", namespace.creator);
        let mut videos = Vec::new();

        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let payload = std::fs::read_to_string(&path)?;
            let chunks: Vec<Chunk> = match serde_json::from_str(&payload) {
                Ok(chunks) => chunks,
                Err(e) => {
                    warn!("Skipping unreadable cache file {}: {}", path.display(), e);
                    continue;
                }
            };

            let Some(first) = chunks.first() else {
                continue;
            };

            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default();
            let video_id = stem.strip_prefix(&prefix).unwrap_or(stem).to_string();

            videos.push(CachedVideo {
                url: format!("https://youtube.com/watch?v={}", video_id),
                video_id,
                title: first.title.clone(),
                summary: first.summary.clone(),
            });
        }

        videos.sort_by(|a, b| a.video_id.cmp(&b.video_id));
        Ok(videos)
    }

    /// Load the union of all cached chunk sets in a namespace, for index builds.
    ///
    /// Unlike [`ChunkCache::list`], corruption here is an error: an index must
    /// be built from the complete namespace or not at all.
    pub fn load_all(&self, namespace: &Namespace) -> Result<Vec<Chunk>> {
        let dir = self.namespace_dir(namespace);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect();
        paths.sort();

        let mut combined = Vec::new();
        for path in paths {
            let payload = std::fs::read_to_string(&path)?;
            let chunks: Vec<Chunk> = serde_json::from_str(&payload)
                .map_err(|e| KlippError::CacheCorrupt(format!("{}: {}", path.display(), e)))?;
            combined.extend(chunks);
        }

        debug!(
            "Loaded {} chunks across namespace {}",
            combined.len(),
            namespace.dir_name()
        );
        Ok(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summary::VideoCategory;

    fn chunk(video_id: &str, chunk_id: u32) -> Chunk {
        Chunk {
            video_id: video_id.to_string(),
            creator: "mindy".to_string(),
            title: "Test Video".to_string(),
            summary: "A test.".to_string(),
            category: VideoCategory::Skincare,
            title_localized: None,
            summary_localized: None,
            chunk_id,
            start_time: "0:00".to_string(),
            end_time: "0:45".to_string(),
            content: "some content".to_string(),
        }
    }

    fn namespace() -> Namespace {
        Namespace::new("mindy", 15, 3, LanguageVariant::Translated)
    }

    #[test]
    fn test_round_trip_preserves_fields_and_order() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ChunkCache::new(dir.path());
        let key = namespace().key("vid1");

        let chunks = vec![chunk("vid1", 1), chunk("vid1", 2), chunk("vid1", 3)];

        assert!(!cache.exists(&key));
        cache.save(&key, &chunks).unwrap();
        assert!(cache.exists(&key));

        let loaded = cache.load(&key).unwrap();
        assert_eq!(loaded, chunks);
    }

    #[test]
    fn test_namespaces_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ChunkCache::new(dir.path());

        let key_15_3 = Namespace::new("mindy", 15, 3, LanguageVariant::Translated).key("vid1");
        let key_10_5 = Namespace::new("mindy", 10, 5, LanguageVariant::Translated).key("vid1");
        let key_source = Namespace::new("mindy", 15, 3, LanguageVariant::Source).key("vid1");

        cache.save(&key_15_3, &[chunk("vid1", 1)]).unwrap();

        assert!(cache.exists(&key_15_3));
        assert!(!cache.exists(&key_10_5));
        assert!(!cache.exists(&key_source));
    }

    #[test]
    fn test_corrupt_payload_surfaces_as_cache_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ChunkCache::new(dir.path());
        let ns = namespace();
        let key = ns.key("vid1");

        std::fs::create_dir_all(dir.path().join(ns.dir_name())).unwrap();

        // Truncated write.
        let path = dir.path().join(ns.dir_name()).join(key.file_name());
        std::fs::write(&path, "[{\"video_id\": \"vid1\", \"creat").unwrap();
        assert!(matches!(
            cache.load(&key),
            Err(KlippError::CacheCorrupt(_))
        ));

        // Valid JSON, wrong shape.
        std::fs::write(&path, "{\"not\": \"a list\"}").unwrap();
        assert!(matches!(
            cache.load(&key),
            Err(KlippError::CacheCorrupt(_))
        ));

        // Chunk records missing required fields.
        std::fs::write(&path, "[{\"video_id\": \"vid1\"}]").unwrap();
        assert!(matches!(
            cache.load(&key),
            Err(KlippError::CacheCorrupt(_))
        ));
    }

    #[test]
    fn test_list_reads_first_chunk_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ChunkCache::new(dir.path());
        let ns = namespace();

        cache
            .save(&ns.key("vid1"), &[chunk("vid1", 1), chunk("vid1", 2)])
            .unwrap();
        cache.save(&ns.key("vid2"), &[chunk("vid2", 1)]).unwrap();

        let videos = cache.list(&ns).unwrap();
        assert_eq!(videos.len(), 2);
        assert_eq!(videos[0].video_id, "vid1");
        assert_eq!(videos[0].title, "Test Video");
        assert_eq!(videos[0].url, "https://youtube.com/watch?v=vid1");
        assert_eq!(videos[1].video_id, "vid2");
    }

    #[test]
    fn test_list_skips_unreadable_files() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ChunkCache::new(dir.path());
        let ns = namespace();

        cache.save(&ns.key("vid1"), &[chunk("vid1", 1)]).unwrap();
        std::fs::write(
            dir.path().join(ns.dir_name()).join("mindy_bad.json"),
            "garbage",
        )
        .unwrap();

        let videos = cache.list(&ns).unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].video_id, "vid1");
    }

    #[test]
    fn test_load_all_combines_namespace() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ChunkCache::new(dir.path());
        let ns = namespace();

        cache
            .save(&ns.key("vid1"), &[chunk("vid1", 1), chunk("vid1", 2)])
            .unwrap();
        cache.save(&ns.key("vid2"), &[chunk("vid2", 1)]).unwrap();

        // A different namespace must not leak in.
        let other = Namespace::new("mindy", 10, 5, LanguageVariant::Translated);
        cache.save(&other.key("vid3"), &[chunk("vid3", 1)]).unwrap();

        let all = cache.load_all(&ns).unwrap();
        assert_eq!(all.len(), 3);
        assert!(all.iter().all(|c| c.video_id != "vid3"));
    }

    #[test]
    fn test_empty_namespace_lists_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ChunkCache::new(dir.path());

        assert!(cache.list(&namespace()).unwrap().is_empty());
        assert!(cache.load_all(&namespace()).unwrap().is_empty());
    }
}
