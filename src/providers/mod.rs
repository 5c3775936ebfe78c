// HTTP clients for the hosted AI providers
//
// Every client is an opaque request/response service:
// - Gemini: text generation plus the Files API for audio uploads
// - OpenAI: chat completions plus the audio transcription endpoints
// - Anthropic: the messages API
//
// Translation only needs "prompt in, text out", which is the
// `CompletionBackend` seam all three clients implement.

pub mod anthropic;
pub mod gemini;
pub mod openai;

use async_trait::async_trait;
use reqwest::{Client, Response};
use std::path::Path;
use std::time::Duration;

pub use anthropic::AnthropicClient;
pub use gemini::GeminiClient;
pub use openai::OpenAiClient;

use crate::error::{LipiError, Result};

/// Per-request timeout for every provider call
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Text completion service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Send a prompt and return the raw response text
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Model identifier used for requests
    fn model(&self) -> String;
}

pub(crate) fn http_client() -> Result<Client> {
    Ok(Client::builder().timeout(REQUEST_TIMEOUT).build()?)
}

pub(crate) fn require_api_key(provider: &str, api_key: &str) -> Result<()> {
    if api_key.trim().is_empty() {
        return Err(LipiError::Config(format!(
            "{} API key is required (use --api-key or the [api_keys] config section)",
            provider
        )));
    }
    Ok(())
}

/// Turn a non-success response into a provider error carrying the body
pub(crate) async fn check_status(provider: &str, response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    Err(LipiError::Provider(format!(
        "{} API error {}: {}",
        provider, status, error_text
    )))
}

/// MIME type for an audio file, by extension
pub fn audio_mime_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "aac" => "audio/aac",
        "ogg" => "audio/ogg",
        "m4a" => "audio/mp4",
        "aiff" => "audio/aiff",
        _ => "application/octet-stream",
    }
}
