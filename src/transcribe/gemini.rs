use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

use super::{TranscribeOptions, Transcriber, Transcription};
use crate::error::{LipiError, Result};
use crate::providers::gemini::{GeminiClient, Part};
use crate::recovery::{self, TranscriptRecord};
use crate::subtitle::Segment;
use crate::subtitle::timecode::from_seconds;

/// Transcriber backed by Gemini audio understanding
pub struct GeminiTranscriber {
    client: GeminiClient,
    options: TranscribeOptions,
}

impl GeminiTranscriber {
    pub fn new(api_key: &str, options: TranscribeOptions) -> Result<Self> {
        let client = GeminiClient::new(api_key, options.model.clone())?;
        Ok(Self { client, options })
    }
}

/// Prompt asking for a JSON array of `{start, end, text}` in seconds
pub fn build_transcription_prompt(options: &TranscribeOptions) -> String {
    let mut prompt = String::new();
    prompt.push_str("Generate a detailed transcript of this audio. ");
    prompt.push_str(
        "For each sentence or phrase, provide the start timestamp, end timestamp, and the exact text spoken. ",
    );
    prompt.push_str(
        "Format your response as a JSON array with objects containing 'start', 'end', and 'text' fields, ",
    );
    prompt.push_str("where 'start' and 'end' are timestamps in seconds (as numbers). ");

    if let Some(language) = options.language.as_deref().filter(|l| !l.is_empty()) {
        prompt.push_str(&format!("The audio is in {}. ", language));
    }

    let transcript_language = options.transcript_language.trim();
    if !transcript_language.is_empty() && !transcript_language.eq_ignore_ascii_case("native") {
        prompt.push_str(&format!("Output the transcript in {}. ", transcript_language));
    }

    if let Some(extra) = options.prompt.as_deref().filter(|p| !p.is_empty()) {
        prompt.push_str(extra);
        prompt.push(' ');
    }

    prompt.push_str("Return ONLY the JSON array, no other text or markdown formatting.");
    prompt
}

/// Convert recovered records into trimmed segments
pub fn parse_transcript(response: &str) -> Result<Vec<Segment>> {
    let records: Vec<TranscriptRecord> = recovery::extract(response)?;
    Ok(records
        .into_iter()
        .map(|r| Segment {
            start: from_seconds(r.start),
            end: from_seconds(r.end),
            text: r.text.trim().to_string(),
        })
        .collect())
}

#[async_trait]
impl Transcriber for GeminiTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcription> {
        if !audio_path.exists() {
            return Err(LipiError::FileNotFound(audio_path.display().to_string()));
        }

        info!("Transcribing {} with Gemini", audio_path.display());
        let file = self.client.upload_file(audio_path).await?;

        let prompt = build_transcription_prompt(&self.options);
        let response = self
            .client
            .generate(vec![Part::text(prompt), Part::file(&file)])
            .await;
        self.client.delete_file(&file.name).await;

        let response = response?;
        debug!("Gemini transcript response: {} chars", response.len());
        let segments = parse_transcript(&response)?;

        let duration = segments.iter().map(|s| s.end).max().unwrap_or_default();
        Ok(Transcription {
            segments,
            language: self.options.language.clone(),
            duration,
        })
    }
}
