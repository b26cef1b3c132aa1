//! Rebuild command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::embedding::OpenAiEmbedder;
use crate::pipeline::TranscriptPipeline;
use crate::search::SearchService;
use anyhow::Result;
use std::sync::Arc;

/// Run the rebuild command: discard the configured index and rebuild it
/// from the cached chunk sets. This is also how videos cached after the
/// initial vector collection build become searchable.
pub async fn run_rebuild(settings: Settings) -> Result<()> {
    let pipeline = TranscriptPipeline::new(&settings)?;
    let namespace = pipeline.namespace().clone();

    let cache = pipeline.cache();
    let embedder = Arc::new(OpenAiEmbedder::with_config(
        &settings.embedding.model,
        settings.embedding.dimensions as usize,
    ));

    let service = SearchService::from_settings(&settings, namespace.clone(), cache, embedder)?;

    Output::info(&format!(
        "Rebuilding {} index for namespace {}...",
        settings.index.backend,
        namespace.dir_name()
    ));

    match service.rebuild().await {
        Ok(()) => {
            Output::success("Index rebuilt.");
            Ok(())
        }
        Err(e) => {
            Output::error(&format!("Rebuild failed: {}", e));
            Err(e.into())
        }
    }
}
