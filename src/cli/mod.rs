//! CLI module for Klipp.

pub mod commands;
mod output;

pub use output::Output;

use clap::{Parser, Subcommand};

/// Klipp - Transcript Chunking and Search
///
/// A CLI tool for segmenting creator video transcripts into overlapping
/// chunks and searching them. The name "Klipp" comes from the
/// Norwegian/Scandinavian word for "clip."
#[derive(Parser, Debug)]
#[command(name = "klipp")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to configuration file
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize Klipp: write the default config and create data directories
    Init,

    /// Chunk a video transcript and cache the result
    Process {
        /// Video ID whose raw transcript is in the data directory
        video_id: String,

        /// Override the configured window size
        #[arg(short, long)]
        window: Option<usize>,

        /// Override the configured step size
        #[arg(short, long)]
        step: Option<usize>,
    },

    /// Search cached transcripts through the configured index backend
    Search {
        /// Search query
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long)]
        limit: Option<usize>,
    },

    /// List cached videos for the configured creator
    List,

    /// Discard the search index and rebuild it from the cached chunk sets
    Rebuild,

    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show current configuration
    Show,

    /// Show configuration file path
    Path,
}
