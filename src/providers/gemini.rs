use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{CompletionBackend, audio_mime_type, check_status, http_client, require_api_key};
use crate::error::{LipiError, Result};

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

const PROVIDER: &str = "Gemini";
const ACTIVE_POLL_ATTEMPTS: usize = 30;
const ACTIVE_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// A file stored with the Gemini Files API
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiFile {
    pub name: String,
    pub uri: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: GeminiFile,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
struct TextPart {
    #[serde(default)]
    text: Option<String>,
}

/// One request part: plain text or a reference to an uploaded file
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Part {
    Text { text: String },
    File { file_data: FileData },
}

#[derive(Debug, Clone, Serialize)]
pub struct FileData {
    pub mime_type: String,
    pub file_uri: String,
}

impl Part {
    pub fn text<S: Into<String>>(text: S) -> Self {
        Part::Text { text: text.into() }
    }

    pub fn file(file: &GeminiFile) -> Self {
        Part::File {
            file_data: FileData {
                mime_type: file.mime_type.clone(),
                file_uri: file.uri.clone(),
            },
        }
    }
}

/// Gemini REST client
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new<S: Into<String>>(api_key: S, model: Option<String>) -> Result<Self> {
        let api_key = api_key.into();
        require_api_key(PROVIDER, &api_key)?;

        Ok(Self {
            client: http_client()?,
            api_key,
            model: model
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Run a generateContent request and return the concatenated text parts
    pub async fn generate(&self, parts: Vec<Part>) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        debug!("Sending Gemini request to: {}", url);

        let request = json!({
            "contents": [{ "role": "user", "parts": parts }]
        });

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;
        let response = check_status(PROVIDER, response).await?;

        let body: GenerateResponse = response.json().await?;
        let text: String = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LipiError::Provider("empty response from Gemini".to_string()));
        }
        Ok(text)
    }

    /// Upload a local file with the resumable upload protocol
    pub async fn upload_file(&self, path: &Path) -> Result<GeminiFile> {
        let bytes = tokio::fs::read(path).await?;
        let mime_type = audio_mime_type(path);
        let display_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio".to_string());

        debug!("Uploading {} ({} bytes) to Gemini", path.display(), bytes.len());

        let start = self
            .client
            .post(format!("{}/upload/v1beta/files", self.base_url))
            .header("x-goog-api-key", &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;
        let start = check_status(PROVIDER, start).await?;

        let upload_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string())
            .ok_or_else(|| LipiError::Provider("Gemini upload did not return an upload URL".to_string()))?;

        let finish = self
            .client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;
        let finish = check_status(PROVIDER, finish).await?;

        let uploaded: UploadResponse = finish.json().await?;
        self.wait_until_active(uploaded.file).await
    }

    async fn wait_until_active(&self, mut file: GeminiFile) -> Result<GeminiFile> {
        for _ in 0..ACTIVE_POLL_ATTEMPTS {
            match file.state.as_deref() {
                None | Some("ACTIVE") => return Ok(file),
                Some("FAILED") => {
                    return Err(LipiError::Provider(format!(
                        "Gemini failed to process uploaded file {}",
                        file.name
                    )));
                }
                Some(_) => {
                    tokio::time::sleep(ACTIVE_POLL_INTERVAL).await;
                    file = self.get_file(&file.name).await?;
                }
            }
        }

        Err(LipiError::Provider(format!(
            "Gemini file {} did not become active in time",
            file.name
        )))
    }

    async fn get_file(&self, name: &str) -> Result<GeminiFile> {
        let response = self
            .client
            .get(format!("{}/v1beta/{}", self.base_url, name))
            .header("x-goog-api-key", &self.api_key)
            .send()
            .await?;
        let response = check_status(PROVIDER, response).await?;
        Ok(response.json().await?)
    }

    /// Delete an uploaded file. Failures are logged, not returned.
    pub async fn delete_file(&self, name: &str) {
        let result = self
            .client
            .delete(format!("{}/v1beta/{}", self.base_url, name))
            .header("x-goog-api-key", &self.api_key)
            .timeout(Duration::from_secs(15))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!("Deleted Gemini file {}", name);
            }
            Ok(response) => warn!("Failed to delete Gemini file {}: {}", name, response.status()),
            Err(e) => warn!("Failed to delete Gemini file {}: {}", name, e),
        }
    }
}

#[async_trait]
impl CompletionBackend for GeminiClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        info!("Requesting Gemini completion with model {}", self.model);
        self.generate(vec![Part::text(prompt)]).await
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}
