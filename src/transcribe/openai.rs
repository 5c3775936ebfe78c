use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use super::{TranscribeOptions, Transcriber, Transcription};
use crate::error::{LipiError, Result};
use crate::providers::openai::{AudioRequest, AudioTask, DEFAULT_AUDIO_MODEL, OpenAiClient};
use crate::subtitle::Segment;
use crate::subtitle::timecode::from_seconds;

#[derive(Debug, Deserialize)]
struct VerboseResponse {
    #[serde(default)]
    text: String,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    segments: Vec<VerboseSegment>,
}

#[derive(Debug, Deserialize)]
struct VerboseSegment {
    start: f64,
    end: f64,
    text: String,
}

/// Transcriber backed by the OpenAI Whisper endpoints
pub struct OpenAiTranscriber {
    client: OpenAiClient,
    options: TranscribeOptions,
}

impl OpenAiTranscriber {
    pub fn new(api_key: &str, options: TranscribeOptions) -> Result<Self> {
        let client =
            OpenAiClient::with_default_model(api_key, options.model.clone(), DEFAULT_AUDIO_MODEL)?;
        Ok(Self { client, options })
    }

    /// English output goes through the translation endpoint
    fn task(&self) -> AudioTask {
        let language = self.options.transcript_language.trim().to_lowercase();
        if language == "english" || language == "en" {
            AudioTask::Translation
        } else {
            AudioTask::Transcription
        }
    }
}

/// Decode a `verbose_json` body into segments
pub fn parse_verbose_json(body: &str) -> Result<(Vec<Segment>, Duration)> {
    let response: VerboseResponse = serde_json::from_str(body)?;
    let duration = response.duration.map(from_seconds).unwrap_or_default();

    if response.segments.is_empty() {
        let text = response.text.trim();
        if text.is_empty() {
            return Err(LipiError::Provider(
                "no segments or text in OpenAI response".to_string(),
            ));
        }
        return Ok((
            vec![Segment {
                start: Duration::ZERO,
                end: duration,
                text: text.to_string(),
            }],
            duration,
        ));
    }

    let segments = response
        .segments
        .into_iter()
        .filter_map(|s| {
            let text = s.text.trim();
            (!text.is_empty()).then(|| Segment {
                start: from_seconds(s.start),
                end: from_seconds(s.end),
                text: text.to_string(),
            })
        })
        .collect();

    Ok((segments, duration))
}

#[async_trait]
impl Transcriber for OpenAiTranscriber {
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcription> {
        if !audio_path.exists() {
            return Err(LipiError::FileNotFound(audio_path.display().to_string()));
        }

        let task = self.task();
        info!("Transcribing {} with OpenAI ({:?})", audio_path.display(), task);

        let request = AudioRequest {
            language: self.options.language.clone(),
            prompt: self.options.prompt.clone(),
        };
        let body = self.client.audio(audio_path, task, &request).await?;
        let (segments, duration) = parse_verbose_json(&body)?;

        let language = match task {
            AudioTask::Translation => Some("en".to_string()),
            AudioTask::Transcription => self.options.language.clone(),
        };

        Ok(Transcription {
            segments,
            language,
            duration,
        })
    }
}
