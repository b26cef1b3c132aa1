//! Video summarization collaborator.
//!
//! Summaries are produced externally by an LLM and are immutable once
//! received; the pipeline pins them into the cached chunk sets.

mod openai;

pub use openai::OpenAiSummarizer;

use crate::cache::LanguageVariant;
use crate::error::Result;
use crate::transcript::TranscriptEntry;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Main beauty category of a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCategory {
    /// Tutorials, reviews, product try-ons.
    Makeup,
    /// Routines, product reviews, ingredients.
    Skincare,
    /// Styling, coloring, or hair treatment tips.
    Haircare,
}

impl std::fmt::Display for VideoCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoCategory::Makeup => write!(f, "makeup"),
            VideoCategory::Skincare => write!(f, "skincare"),
            VideoCategory::Haircare => write!(f, "haircare"),
        }
    }
}

/// Summary of one video, as returned by the summarization collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoSummary {
    /// Video title in English.
    pub title: String,
    /// Video summary in English.
    pub summary: String,
    /// Main category of the video.
    pub category: VideoCategory,
    /// Title in the source language, if different from English.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title_localized: Option<String>,
    /// Summary in the source language, if different from English.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary_localized: Option<String>,
    /// Per-entry translated transcript, when translation was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translated_entries: Option<Vec<TranscriptEntry>>,
}

/// Trait for summarization implementations.
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize, categorize, and (for the translated variant) translate
    /// a transcript. No retry policy here; callers add backoff.
    async fn summarize(
        &self,
        transcript: &str,
        entries: &[TranscriptEntry],
        variant: LanguageVariant,
    ) -> Result<VideoSummary>;
}
