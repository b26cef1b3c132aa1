//! List command implementation.

use crate::cli::Output;
use crate::config::Settings;
use crate::pipeline::TranscriptPipeline;
use anyhow::Result;

/// Run the list command.
pub fn run_list(settings: Settings) -> Result<()> {
    let pipeline = TranscriptPipeline::new(&settings)?;

    match pipeline.list_cached_videos() {
        Ok(videos) => {
            if videos.is_empty() {
                Output::info(
                    "No cached videos yet. Use 'klipp process <video_id>' to add content.",
                );
            } else {
                Output::header(&format!(
                    "Cached Videos for {} ({})",
                    settings.general.creator,
                    videos.len()
                ));
                println!();

                for video in &videos {
                    Output::video_info(&video.title, &video.video_id, &video.summary, &video.url);
                }

                println!();
                Output::kv("Namespace", &pipeline.namespace().dir_name());
            }
        }
        Err(e) => {
            Output::error(&format!("Failed to list cached videos: {}", e));
            return Err(e.into());
        }
    }

    Ok(())
}
