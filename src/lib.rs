//! Klipp - Transcript Chunking and Search
//!
//! A CLI tool for segmenting creator video transcripts into overlapping,
//! retrievable chunks and searching them with timestamps.
//!
//! The name "Klipp" comes from the Norwegian/Scandinavian word for "clip."
//!
//! # Overview
//!
//! Klipp allows you to:
//! - Split raw timestamped transcripts into ordered entries
//! - Build overlapping sliding-window chunks enriched with video metadata
//! - Cache chunk sets durably, keyed by their processing parameters
//! - Search cached chunks through a lexical (BM25) or vector index backend
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - `config` - Configuration management
//! - `transcript` - Raw transcript parsing and storage
//! - `summary` - External summarization collaborator
//! - `chunking` - Sliding-window chunk building
//! - `cache` - Durable chunk-set cache
//! - `embedding` - Embedding generation
//! - `index` - Index backends (lexical, vector)
//! - `search` - Ranked query execution
//! - `pipeline` - Pipeline coordination
//!
//! # Example
//!
//! ```rust,no_run
//! use klipp::config::Settings;
//! use klipp::pipeline::TranscriptPipeline;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let settings = Settings::load()?;
//!     let pipeline = TranscriptPipeline::new(&settings)?;
//!
//!     // Chunk a video transcript (served from cache on repeat calls)
//!     let chunks = pipeline.get_or_build_chunks("dQw4w9WgXcQ").await?;
//!     println!("Got {} chunks", chunks.len());
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod chunking;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod openai;
pub mod pipeline;
pub mod search;
pub mod summary;
pub mod transcript;

pub use error::{KlippError, Result};
