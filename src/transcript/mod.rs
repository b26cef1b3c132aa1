//! Transcript parsing: raw timestamped text to ordered entries.
//!
//! Raw transcripts are plain text, one spoken sentence per line, where
//! content lines start with a `M:SS` or `H:MM:SS` timestamp token. Lines
//! that don't look like that (headers, blank lines) are dropped.

use crate::error::{KlippError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing::debug;

/// A single timestamped line from a raw transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    /// Timestamp token as it appeared in the source (e.g. "0:15", "1:02:30").
    pub time: String,
    /// Spoken sentence for this timestamp.
    pub text: String,
}

fn line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(\d+(?::\d+){1,2})\s+(\S.*)$").unwrap())
}

/// Parse a timestamp token in `M:SS` or `H:MM:SS` form into total seconds.
///
/// Seconds must be below 60; in the three-part form minutes must be too.
/// A malformed token is an error, never silently treated as zero.
pub fn parse_timestamp(token: &str) -> Result<u32> {
    let invalid = || KlippError::InvalidTimestamp(token.to_string());

    let parts: Vec<u32> = token
        .split(':')
        .map(|p| p.parse::<u32>().map_err(|_| invalid()))
        .collect::<Result<_>>()?;

    match parts[..] {
        [minutes, seconds] if seconds < 60 => Ok(minutes * 60 + seconds),
        [hours, minutes, seconds] if minutes < 60 && seconds < 60 => {
            Ok(hours * 3600 + minutes * 60 + seconds)
        }
        _ => Err(invalid()),
    }
}

/// Split a raw transcript into ordered entries plus the space-joined full text.
///
/// Non-matching lines are skipped. A line whose leading token has the
/// timestamp shape but an out-of-range component fails the whole split.
/// Empty input yields empty output.
pub fn split_transcript(raw: &str) -> Result<(Vec<TranscriptEntry>, String)> {
    let mut entries = Vec::new();
    let mut full_text = String::new();

    for line in raw.lines() {
        let Some(caps) = line_pattern().captures(line.trim()) else {
            continue;
        };

        let time = caps[1].to_string();
        parse_timestamp(&time)?;

        let text = caps[2].trim().to_string();
        if !full_text.is_empty() {
            full_text.push(' ');
        }
        full_text.push_str(&text);

        entries.push(TranscriptEntry { time, text });
    }

    debug!("Split transcript into {} entries", entries.len());
    Ok((entries, full_text))
}

/// Raw transcript storage: one text file per (creator, video).
pub struct TranscriptStore {
    root: PathBuf,
}

impl TranscriptStore {
    /// Create a store rooted at the raw-transcript data directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path of the raw transcript for a (creator, video) pair.
    pub fn path_for(&self, creator: &str, video_id: &str) -> PathBuf {
        self.root.join(creator).join(format!("{}.txt", video_id))
    }

    /// Load a raw transcript, failing if the source file is absent.
    pub fn load(&self, creator: &str, video_id: &str) -> Result<String> {
        let path = self.path_for(creator, video_id);
        if !path.is_file() {
            return Err(KlippError::MissingTranscript(format!(
                "{} ({})",
                video_id,
                path.display()
            )));
        }
        Ok(std::fs::read_to_string(&path)?)
    }
}
