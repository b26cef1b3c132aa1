//! OpenAI-backed summarization implementation.

use super::{Summarizer, VideoSummary};
use crate::cache::LanguageVariant;
use crate::error::{KlippError, Result};
use crate::openai::create_client;
use crate::transcript::TranscriptEntry;
use async_openai::types::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs,
};
use async_trait::async_trait;
use tracing::{debug, info};

const INSTRUCTIONS: &str = "\
You are a multilingual beauty content analyst.

Your task is to analyze video transcripts related to beauty, skincare, or makeup content.

Follow these steps carefully:

1. **Summarize** the full video transcript in its source language, focusing on key talking points, tone, and product mentions.
2. **Translate** the summary and title into English.
3. **Categorize** the video into one of the following beauty categories:
- makeup: tutorials, reviews, product try-ons
- skincare: routines, product reviews, ingredients
- haircare: styling, coloring, or hair treatment tips

Respond with a single JSON object using exactly these keys:
title (English), summary (English), category, title_localized, summary_localized";

const TRANSLATE_STEP: &str = "\
4. **Translate each transcript entry**, keeping its timestamp. Add a key
translated_entries: an array of {\"time\": ..., \"text\": ...} objects, one per
input entry, in order.";

/// OpenAI-based summarizer.
pub struct OpenAiSummarizer {
    client: async_openai::Client<async_openai::config::OpenAIConfig>,
    model: String,
}

impl OpenAiSummarizer {
    /// Create a new summarizer with the default model.
    pub fn new() -> Self {
        Self::with_model("gpt-4o-mini")
    }

    /// Create a new summarizer with a custom model.
    pub fn with_model(model: &str) -> Self {
        Self {
            client: create_client(),
            model: model.to_string(),
        }
    }

    /// Extract the JSON object from an LLM response that may wrap it in prose.
    fn parse_summary(response: &str) -> Result<VideoSummary> {
        let json_start = response.find('{');
        let json_end = response.rfind('}');

        let json_str = match (json_start, json_end) {
            (Some(start), Some(end)) if end > start => &response[start..=end],
            _ => response,
        };

        serde_json::from_str(json_str).map_err(|e| {
            KlippError::Summarization(format!(
                "Failed to parse summary response: {}. Response was: {}",
                e,
                truncate(response, 500)
            ))
        })
    }
}

impl Default for OpenAiSummarizer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Summarizer for OpenAiSummarizer {
    async fn summarize(
        &self,
        transcript: &str,
        entries: &[TranscriptEntry],
        variant: LanguageVariant,
    ) -> Result<VideoSummary> {
        let system_message = match variant {
            LanguageVariant::Translated => format!("{}\n\n{}", INSTRUCTIONS, TRANSLATE_STEP),
            LanguageVariant::Source => INSTRUCTIONS.to_string(),
        };

        // The translated variant needs the timestamped entries; the plain
        // transcript is enough otherwise.
        let user_message = match variant {
            LanguageVariant::Translated => serde_json::to_string(entries)?,
            LanguageVariant::Source => transcript.to_string(),
        };

        let messages: Vec<ChatCompletionRequestMessage> = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(system_message)
                .build()
                .map_err(|e| KlippError::Summarization(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(user_message)
                .build()
                .map_err(|e| KlippError::Summarization(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(messages)
            .temperature(0.3)
            .build()
            .map_err(|e| KlippError::Summarization(e.to_string()))?;

        info!("Summarizing transcript with {}", self.model);

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| KlippError::OpenAI(format!("Failed to get summary response: {}", e)))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| KlippError::Summarization("Empty response from LLM".to_string()))?;

        debug!("Summary response: {}", truncate(content, 500));

        Self::parse_summary(content)
    }
}

/// Truncate on a character boundary; summaries are routinely CJK text.
fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
