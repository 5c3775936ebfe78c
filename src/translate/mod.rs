// Subtitle translation over hosted LLMs
//
// Entries are translated in batches. Each batch is one prompt whose answer must
// be a JSON array of `{index, text}` with exactly one result per input item.
// Batches run through the pipeline and the results are merged back by index.

pub mod llm;

use async_trait::async_trait;
use indicatif::ProgressBar;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::info;

pub use llm::{LlmTranslator, build_prompt};

use crate::error::{LipiError, Result};
use crate::pipeline::{UnitProcessor, WorkUnit, run_concurrent};
use crate::providers::{AnthropicClient, CompletionBackend, GeminiClient, OpenAiClient};
use crate::recovery::RecoverableRecord;

/// Items per request when the caller does not choose
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Text to translate, tagged with its 0-based document position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationItem {
    pub index: usize,
    pub text: String,
}

/// Translated text for the item with the same index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResult {
    pub index: usize,
    #[serde(default)]
    pub text: String,
}

impl RecoverableRecord for TranslationResult {
    const WRAPPER_KEYS: &'static [&'static str] = &["results", "translations", "data", "items"];
    const REPAIR_ESCAPES: bool = true;

    fn is_evidence(&self) -> bool {
        !self.text.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct TranslateOptions {
    pub target_language: String,
    pub input_language: Option<String>,
    pub model: Option<String>,
    /// Extra instructions appended to the prompt
    pub prompt: Option<String>,
}

/// Main trait for translation operations
#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate one batch; returns exactly one result per item
    async fn translate_batch(&self, items: &[TranslationItem]) -> Result<Vec<TranslationResult>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationProvider {
    Gemini,
    OpenAi,
    Anthropic,
}

impl FromStr for TranslationProvider {
    type Err = LipiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            "anthropic" | "claude" => Ok(Self::Anthropic),
            _ => Err(LipiError::Config(format!(
                "Invalid translation provider '{}'. Valid providers: gemini, openai, anthropic",
                s
            ))),
        }
    }
}

impl fmt::Display for TranslationProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gemini => f.write_str("gemini"),
            Self::OpenAi => f.write_str("openai"),
            Self::Anthropic => f.write_str("anthropic"),
        }
    }
}

/// Factory for creating translator instances
pub struct TranslatorFactory;

impl TranslatorFactory {
    pub fn create_translator(
        provider: TranslationProvider,
        api_key: &str,
        options: TranslateOptions,
    ) -> Result<Box<dyn Translator>> {
        let model = options.model.clone();
        let backend: Box<dyn CompletionBackend> = match provider {
            TranslationProvider::Gemini => Box::new(GeminiClient::new(api_key, model)?),
            TranslationProvider::OpenAi => Box::new(OpenAiClient::new(api_key, model)?),
            TranslationProvider::Anthropic => Box::new(AnthropicClient::new(api_key, model)?),
        };
        Ok(Box::new(LlmTranslator::new(backend, options)))
    }
}

/// A contiguous slice of items sent as one request
#[derive(Debug, Clone)]
pub struct TranslationBatch {
    pub index: usize,
    pub items: Vec<TranslationItem>,
}

impl WorkUnit for TranslationBatch {
    const KIND: &'static str = "batch";

    fn index(&self) -> usize {
        self.index
    }
}

/// Split items into batches of `batch_size` (0 means the default)
pub fn make_batches(items: Vec<TranslationItem>, batch_size: usize) -> Vec<TranslationBatch> {
    let batch_size = if batch_size == 0 {
        DEFAULT_BATCH_SIZE
    } else {
        batch_size
    };

    items
        .chunks(batch_size)
        .enumerate()
        .map(|(index, chunk)| TranslationBatch {
            index,
            items: chunk.to_vec(),
        })
        .collect()
}

/// Pipeline processor that sends one batch to a translator
pub struct BatchTranslation {
    translator: Arc<dyn Translator>,
    progress: Option<ProgressBar>,
}

impl BatchTranslation {
    pub fn new(translator: Arc<dyn Translator>) -> Self {
        Self {
            translator,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }
}

#[async_trait]
impl UnitProcessor<TranslationBatch> for BatchTranslation {
    type Output = TranslationResult;

    async fn process(&self, batch: TranslationBatch) -> Result<Vec<TranslationResult>> {
        let results = self.translator.translate_batch(&batch.items).await?;
        if let Some(progress) = &self.progress {
            progress.inc(batch.items.len() as u64);
        }
        Ok(results)
    }
}

/// Translate all items with up to `concurrency` batches in flight
pub async fn translate_concurrently(
    processor: BatchTranslation,
    items: Vec<TranslationItem>,
    batch_size: usize,
    concurrency: usize,
) -> Result<Vec<TranslationResult>> {
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let batches = make_batches(items, batch_size);
    info!(
        "Translating {} batches with concurrency {}",
        batches.len(),
        concurrency
    );

    let mut results = run_concurrent(batches, concurrency, Arc::new(processor)).await?;
    results.sort_by_key(|r| r.index);
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn items(count: usize) -> Vec<TranslationItem> {
        (0..count)
            .map(|index| TranslationItem {
                index,
                text: format!("line {}", index),
            })
            .collect()
    }

    /// Upper-cases text, failing on a chosen batch start index
    struct Upper {
        calls: AtomicUsize,
        fail_at: Option<usize>,
    }

    #[async_trait]
    impl Translator for Upper {
        async fn translate_batch(&self, items: &[TranslationItem]) -> Result<Vec<TranslationResult>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if items.first().map(|i| i.index) == self.fail_at {
                return Err(LipiError::ResultCountMismatch { expected: items.len(), actual: 0 });
            }
            Ok(items
                .iter()
                .rev()
                .map(|i| TranslationResult {
                    index: i.index,
                    text: i.text.to_uppercase(),
                })
                .collect())
        }
    }

    #[test]
    fn test_make_batches() {
        let batches = make_batches(items(120), 0);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].index, 2);
        assert_eq!(batches[2].items.len(), 20);
        assert_eq!(batches[1].items[0].index, 50);
    }

    #[tokio::test]
    async fn test_translate_concurrently_orders_by_index() {
        let translator = Arc::new(Upper { calls: AtomicUsize::new(0), fail_at: None });
        let results = translate_concurrently(BatchTranslation::new(translator.clone()), items(25), 4, 3)
            .await
            .unwrap();

        assert_eq!(results.len(), 25);
        assert!(results.iter().enumerate().all(|(i, r)| r.index == i));
        assert_eq!(results[7].text, "LINE 7");
        assert_eq!(translator.calls.load(Ordering::SeqCst), 7);
    }

    #[tokio::test]
    async fn test_batch_failure_is_reported_with_batch_index() {
        let translator = Arc::new(Upper { calls: AtomicUsize::new(0), fail_at: Some(8) });
        let err = translate_concurrently(BatchTranslation::new(translator), items(12), 4, 1)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "batch 2 failed: Expected 4 results, got 0");
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("claude".parse::<TranslationProvider>().unwrap(), TranslationProvider::Anthropic);
        assert!("deepl".parse::<TranslationProvider>().is_err());
    }
}
