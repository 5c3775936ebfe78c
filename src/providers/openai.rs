use async_trait::async_trait;
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tracing::{debug, info};

use super::{CompletionBackend, audio_mime_type, check_status, http_client, require_api_key};
use crate::error::{LipiError, Result};

pub const DEFAULT_CHAT_MODEL: &str = "gpt-5-mini";
pub const DEFAULT_AUDIO_MODEL: &str = "whisper-1";
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";

const PROVIDER: &str = "OpenAI";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Which audio endpoint to call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioTask {
    /// Transcribe in the spoken language
    Transcription,
    /// Transcribe straight into English
    Translation,
}

/// Parameters for an audio request
#[derive(Debug, Clone, Default)]
pub struct AudioRequest {
    pub language: Option<String>,
    pub prompt: Option<String>,
}

/// OpenAI REST client
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiClient {
    /// `model` defaults to the chat model; use `DEFAULT_AUDIO_MODEL` for audio work
    pub fn new<S: Into<String>>(api_key: S, model: Option<String>) -> Result<Self> {
        Self::with_default_model(api_key, model, DEFAULT_CHAT_MODEL)
    }

    pub fn with_default_model<S: Into<String>>(
        api_key: S,
        model: Option<String>,
        default_model: &str,
    ) -> Result<Self> {
        let api_key = api_key.into();
        require_api_key(PROVIDER, &api_key)?;

        Ok(Self {
            client: http_client()?,
            api_key,
            model: model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| default_model.to_string()),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Upload audio and return the raw `verbose_json` body
    pub async fn audio(&self, path: &Path, task: AudioTask, request: &AudioRequest) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(audio_mime_type(path))?;

        let mut form = Form::new()
            .part("file", part)
            .text("model", self.model.clone())
            .text("response_format", "verbose_json");

        let endpoint = match task {
            AudioTask::Transcription => {
                form = form.text("timestamp_granularities[]", "segment");
                if let Some(language) = &request.language {
                    form = form.text("language", language.clone());
                }
                "transcriptions"
            }
            AudioTask::Translation => "translations",
        };
        if let Some(prompt) = &request.prompt {
            form = form.text("prompt", prompt.clone());
        }

        let url = format!("{}/v1/audio/{}", self.base_url, endpoint);
        debug!("Sending OpenAI audio request to: {}", url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;
        let response = check_status(PROVIDER, response).await?;

        Ok(response.text().await?)
    }
}

#[async_trait]
impl CompletionBackend for OpenAiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        info!("Requesting OpenAI completion with model {}", self.model);

        let request = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = check_status(PROVIDER, response).await?;

        let body: ChatResponse = response.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| LipiError::Provider("empty response from OpenAI".to_string()))
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}
