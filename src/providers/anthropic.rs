use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use super::{CompletionBackend, check_status, http_client, require_api_key};
use crate::error::{LipiError, Result};

pub const DEFAULT_MODEL: &str = "claude-haiku-4-5";
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

const PROVIDER: &str = "Anthropic";
const API_VERSION: &str = "2023-06-01";
const MAX_TOKENS: u32 = 4096;

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic messages API client
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl AnthropicClient {
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
}

#[async_trait]
impl CompletionBackend for AnthropicClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        info!("Requesting Anthropic completion with model {}", self.model);

        let request = json!({
            "model": self.model,
            "max_tokens": MAX_TOKENS,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .await?;
        let response = check_status(PROVIDER, response).await?;

        let body: MessagesResponse = response.json().await?;
        let text: String = body
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text)
            .collect();

        if text.trim().is_empty() {
            return Err(LipiError::Provider("empty response from Anthropic".to_string()));
        }
        Ok(text)
    }

    fn model(&self) -> String {
        self.model.clone()
    }
}
