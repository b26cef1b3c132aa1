//! Sliding-window chunking of transcript entries.
//!
//! Chunks overlap: the window advances by `step_size` entries while covering
//! `window_size` entries, so neighboring chunks share context for retrieval.

use crate::summary::{VideoCategory, VideoSummary};
use crate::transcript::TranscriptEntry;
use serde::{Deserialize, Serialize};

/// Default number of transcript entries per window.
pub const DEFAULT_WINDOW_SIZE: usize = 15;

/// Default number of entries the window advances between chunks.
pub const DEFAULT_STEP_SIZE: usize = 3;

/// An overlapping, time-bounded transcript segment with video metadata.
///
/// All required fields are enforced at deserialization; a cache entry
/// missing any of them does not parse as a chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Video this chunk belongs to.
    pub video_id: String,
    /// Creator namespace the video lives in.
    pub creator: String,
    /// Video title in English.
    pub title: String,
    /// Video summary in English.
    pub summary: String,
    /// Main category of the video.
    pub category: VideoCategory,
    /// Title in the source language, present for the source variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_localized: Option<String>,
    /// Summary in the source language, present for the source variant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_localized: Option<String>,
    /// 1-based position of this chunk within the video.
    pub chunk_id: u32,
    /// Timestamp of the first entry in the window.
    pub start_time: String,
    /// Timestamp of the last entry in the window.
    pub end_time: String,
    /// Window entries' text joined by single spaces.
    pub content: String,
}

/// Build overlapping chunks from ordered transcript entries.
///
/// The window slides by `step_size` until it covers fewer than 2 entries
/// (the tail remainder is dropped, never emitted undersized) or until a
/// window reaches the final entry (exactly one terminal chunk covers the
/// end of the transcript). Deterministic for identical inputs.
pub fn build_chunks(
    video_id: &str,
    creator: &str,
    entries: &[TranscriptEntry],
    summary: &VideoSummary,
    window_size: usize,
    step_size: usize,
) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let total = entries.len();

    // A zero step would never advance the window.
    if step_size == 0 {
        return chunks;
    }

    let mut chunk_id = 1u32;
    let mut start = 0usize;

    while start < total {
        let end = (start + window_size).min(total);
        let window = &entries[start..end];

        if window.len() < 2 {
            break;
        }

        let content = window
            .iter()
            .map(|e| e.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        chunks.push(Chunk {
            video_id: video_id.to_string(),
            creator: creator.to_string(),
            title: summary.title.clone(),
            summary: summary.summary.clone(),
            category: summary.category,
            title_localized: summary.title_localized.clone(),
            summary_localized: summary.summary_localized.clone(),
            chunk_id,
            start_time: window[0].time.clone(),
            end_time: window[window.len() - 1].time.clone(),
            content,
        });

        chunk_id += 1;

        if end == total {
            break;
        }

        start += step_size;
    }

    chunks
}
