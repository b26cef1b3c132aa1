//! Search command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::OpenAiEmbedder;
use crate::pipeline::TranscriptPipeline;
use crate::search::SearchService;
use crate::transcript::parse_timestamp;
use anyhow::Result;
use std::sync::Arc;

/// Run the search command.
pub async fn run_search(query: &str, limit: Option<usize>, settings: Settings) -> Result<()> {
    let k = limit.unwrap_or(settings.search.top_k);

    // The pipeline resolves the namespace from the configured parameters.
    let pipeline = TranscriptPipeline::new(&settings)?;
    let namespace = pipeline.namespace().clone();

    let cache = pipeline.cache();
    let embedder = Arc::new(OpenAiEmbedder::with_config(
        &settings.embedding.model,
        settings.embedding.dimensions as usize,
    ));

    let service = SearchService::from_settings(&settings, namespace, cache, embedder)?;

    let spinner = Output::spinner("Searching...");
    let results = service.search(query, k).await;
    spinner.finish_and_clear();

    match results {
        Ok(hits) => {
            if hits.is_empty() {
                Output::warning("No results found matching your query.");
            } else {
                Output::success(&format!("Found {} results", hits.len()));

                for hit in &hits {
                    let url = match parse_timestamp(&hit.start_time) {
                        Ok(seconds) => format!(
                            "https://youtube.com/watch?v={}&t={}s",
                            hit.video_id, seconds
                        ),
                        Err(_) => format!("https://youtube.com/watch?v={}", hit.video_id),
                    };
                    Output::search_result(
                        &hit.title,
                        &hit.start_time,
                        hit.score,
                        &hit.content,
                        &url,
                    );
                }
            }
        }
        Err(e) => {
            Output::error(&format!("Search failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
