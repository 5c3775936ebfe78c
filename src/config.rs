use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{LipiError, Result};
use crate::media::DEFAULT_CHUNK_CONCURRENCY;
use crate::pipeline::DEFAULT_CONCURRENCY;
use crate::translate::DEFAULT_BATCH_SIZE;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub transcribe: TranscribeConfig,
    pub translate: TranslateConfig,
    pub media: MediaConfig,
    pub api_keys: ApiKeys,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscribeConfig {
    /// Transcription provider: gemini or openai
    pub provider: String,
    /// Model override; the provider default is used when unset
    pub model: Option<String>,
    /// Spoken language hint, e.g. "ja"
    pub language: Option<String>,
    /// Language of the transcript text: "native" keeps the spoken language
    pub transcript_language: String,
    /// Length of each audio chunk in minutes
    pub chunk_minutes: u64,
    /// Chunks transcribed at once
    pub concurrency: usize,
    /// Extra instructions appended to the prompt
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslateConfig {
    /// Translation provider: gemini, openai or anthropic
    pub provider: String,
    pub model: Option<String>,
    /// Batches translated at once
    pub concurrency: usize,
    /// Entries per request
    pub batch_size: usize,
    pub prompt: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_path: String,
    /// Path to ffprobe binary
    pub ffprobe_path: String,
    /// ffmpeg processes cutting chunks at once
    pub chunk_concurrency: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiKeys {
    pub gemini: Option<String>,
    pub openai: Option<String>,
    pub anthropic: Option<String>,
}

impl Default for TranscribeConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: None,
            language: None,
            transcript_language: "native".to_string(),
            chunk_minutes: 1,
            concurrency: DEFAULT_CONCURRENCY,
            prompt: None,
        }
    }
}

impl Default for TranslateConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: None,
            concurrency: DEFAULT_CONCURRENCY,
            batch_size: DEFAULT_BATCH_SIZE,
            prompt: None,
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            chunk_concurrency: DEFAULT_CHUNK_CONCURRENCY,
        }
    }
}

impl ApiKeys {
    /// Key configured for a provider name, ignoring blank values
    pub fn for_provider(&self, provider: &str) -> Option<String> {
        let key = match provider.to_lowercase().as_str() {
            "gemini" => &self.gemini,
            "openai" => &self.openai,
            "anthropic" | "claude" => &self.anthropic,
            _ => &None,
        };
        key.clone().filter(|k| !k.trim().is_empty())
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| LipiError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| LipiError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| LipiError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)
            .map_err(|e| LipiError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }
}
