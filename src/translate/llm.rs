use async_trait::async_trait;
use tracing::{debug, info};

use super::{TranslateOptions, TranslationItem, TranslationResult, Translator};
use crate::error::{LipiError, Result};
use crate::providers::CompletionBackend;
use crate::recovery;

/// Translator that prompts any completion backend for a JSON array
pub struct LlmTranslator {
    backend: Box<dyn CompletionBackend>,
    options: TranslateOptions,
}

impl LlmTranslator {
    pub fn new(backend: Box<dyn CompletionBackend>, options: TranslateOptions) -> Self {
        Self { backend, options }
    }
}

/// Build the batch translation prompt
pub fn build_prompt(options: &TranslateOptions, items: &[TranslationItem]) -> Result<String> {
    let mut prompt = String::new();

    match options.input_language.as_deref().filter(|l| !l.is_empty()) {
        Some(input) => prompt.push_str(&format!(
            "Translate the following {} subtitle texts to {}.\n\n",
            input, options.target_language
        )),
        None => prompt.push_str(&format!(
            "Translate the following subtitle texts to {}.\n\n",
            options.target_language
        )),
    }

    prompt.push_str("IMPORTANT INSTRUCTIONS:\n");
    prompt.push_str("1. Translate ONLY the text content, preserving the meaning.\n");
    prompt.push_str("2. Translations MUST make sense given the context of the original text rather than a literal translation.\n");
    prompt.push_str("3. Keep any formatting tags (like {\\pos}, {\\an}, etc.) unchanged.\n");
    prompt.push_str("4. Preserve line breaks (\\N) in the same positions.\n");
    prompt.push_str("5. Return ONLY a JSON array with the same structure.\n");
    prompt.push_str("6. Each object must have 'index' and 'text' fields.\n");
    prompt.push_str("7. The 'index' values must match the input indices exactly.\n");
    prompt.push_str("8. Do not add any explanation or markdown formatting.\n\n");

    if let Some(extra) = options.prompt.as_deref().filter(|p| !p.is_empty()) {
        prompt.push_str(&format!("Additional instructions: {}\n\n", extra));
    }

    prompt.push_str("Input JSON:\n");
    prompt.push_str(&serde_json::to_string_pretty(items)?);
    prompt.push_str("\n\nOutput the translated JSON array only:");

    Ok(prompt)
}

#[async_trait]
impl Translator for LlmTranslator {
    async fn translate_batch(&self, items: &[TranslationItem]) -> Result<Vec<TranslationResult>> {
        if items.is_empty() {
            return Ok(Vec::new());
        }

        info!(
            "Translating {} items to {} with {}",
            items.len(),
            self.options.target_language,
            self.backend.model()
        );

        let prompt = build_prompt(&self.options, items)?;
        let response = self.backend.complete(&prompt).await?;
        if response.trim().is_empty() {
            return Err(LipiError::Provider("empty translation response".to_string()));
        }
        debug!("Raw translation response: {} chars", response.len());

        let results: Vec<TranslationResult> = recovery::extract(&response)?;
        if results.len() != items.len() {
            return Err(LipiError::ResultCountMismatch {
                expected: items.len(),
                actual: results.len(),
            });
        }

        Ok(results)
    }
}
