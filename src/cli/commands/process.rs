//! Process command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::TranscriptPipeline;
use anyhow::Result;

/// Run the process command: chunk one video's transcript and cache it.
pub async fn run_process(
    video_id: &str,
    window: Option<usize>,
    step: Option<usize>,
    mut settings: Settings,
) -> Result<()> {
    if let Some(window) = window {
        settings.chunking.window_size = window;
    }
    if let Some(step) = step {
        settings.chunking.step_size = step;
    }

    let pipeline = TranscriptPipeline::new(&settings)?;

    if pipeline.has_cached(video_id) {
        Output::info(&format!(
            "{} is already cached under namespace {}",
            video_id,
            pipeline.namespace().dir_name()
        ));
        return Ok(());
    }

    let spinner = Output::spinner("Processing transcript...");
    let result = pipeline.get_or_build_chunks(video_id).await;
    spinner.finish_and_clear();

    match result {
        Ok(chunks) => {
            Output::success(&format!("Created {} chunks for {}", chunks.len(), video_id));
            Output::kv("Namespace", &pipeline.namespace().dir_name());
            if let Some(first) = chunks.first() {
                Output::kv("Title", &first.title);
                Output::kv("Category", &first.category.to_string());
            }
        }
        Err(e) => {
            Output::error(&format!("Processing failed: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
