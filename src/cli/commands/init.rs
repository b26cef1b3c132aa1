//! Init command implementation.

use crate::cli::Output;
use crate::config::Settings;
use anyhow::Result;

/// Run the init command: write the default config (if absent) and create
/// the data and cache directories.
pub fn run_init(settings: &Settings) -> Result<()> {
    let config_path = Settings::default_config_path();

    if config_path.exists() {
        Output::info(&format!(
            "Configuration already exists at {}",
            config_path.display()
        ));
    } else {
        settings.save()?;
        Output::success(&format!("Wrote configuration to {}", config_path.display()));
    }

    std::fs::create_dir_all(settings.data_dir())?;
    std::fs::create_dir_all(settings.cache_dir())?;

    Output::kv("Data directory", &settings.data_dir().display().to_string());
    Output::kv("Cache directory", &settings.cache_dir().display().to_string());
    Output::kv("Creator", &settings.general.creator);
    Output::info(&format!(
        "Place raw transcripts under {}/<creator>/<video_id>.txt",
        settings.data_dir().display()
    ));

    Ok(())
}
