use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use lipi::error::{LipiError, Result};
use lipi::providers::CompletionBackend;
use lipi::subtitle::{Format, SubtitleDocument};
use lipi::translate::{
    LlmTranslator, TranslateOptions, TranslationItem, TranslationProvider, TranslationResult,
    Translator,
};
use lipi::workflow::{SubtitleTranslateOptions, translate_document};

const ASS: &str = "[Script Info]
Title: Demo

[Events]
Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text
Dialogue: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,{\\an8}Good morning
Dialogue: 0,0:00:03.00,0:00:04.00,Default,,0,0,0,,Two\\Nlines
";

fn options(overlay: bool, batch_size: usize) -> SubtitleTranslateOptions {
    SubtitleTranslateOptions {
        output: None,
        overlay,
        concurrency: 2,
        batch_size,
        provider: TranslationProvider::Gemini,
        api_key: String::new(),
        translate: TranslateOptions {
            target_language: "ja".to_string(),
            ..Default::default()
        },
    }
}

/// Answers with a fenced JSON array, the way chat models tend to
struct CannedBackend {
    response: String,
}

#[async_trait]
impl CompletionBackend for CannedBackend {
    async fn complete(&self, _prompt: &str) -> Result<String> {
        Ok(self.response.clone())
    }

    fn model(&self) -> String {
        "canned".to_string()
    }
}

/// Prefixes every text with its index and counts batches
struct Tagging {
    batches: AtomicUsize,
}

#[async_trait]
impl Translator for Tagging {
    async fn translate_batch(&self, items: &[TranslationItem]) -> Result<Vec<TranslationResult>> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        Ok(items
            .iter()
            .map(|item| TranslationResult {
                index: item.index,
                text: format!("[{}] {}", item.index, item.text),
            })
            .collect())
    }
}

#[tokio::test]
async fn llm_translation_of_ass_keeps_tags_and_breaks() {
    let response = "Sure! Here it is:\n```json\n[{\"index\": 0, \"text\": \"おはよう\"}, {\"index\": 1, \"text\": \"二行\\N目\"}]\n```";
    let translator = LlmTranslator::new(
        Box::new(CannedBackend {
            response: response.to_string(),
        }),
        options(false, 50).translate,
    );

    let mut doc = SubtitleDocument::parse(Format::Ass, ASS).unwrap();
    translate_document(&mut doc, Arc::new(translator), &options(false, 50))
        .await
        .unwrap();

    let rendered = doc.render();
    assert!(rendered.contains(",,{\\an8}おはよう\n"));
    assert!(rendered.contains(",,二行\\N目\n"));
    assert!(rendered.starts_with("[Script Info]\nTitle: Demo\n"));
}

#[tokio::test]
async fn overlay_translation_of_ass_keeps_original() {
    let translator = Arc::new(Tagging {
        batches: AtomicUsize::new(0),
    });

    let mut doc = SubtitleDocument::parse(Format::Ass, ASS).unwrap();
    translate_document(&mut doc, translator.clone(), &options(true, 1))
        .await
        .unwrap();

    assert_eq!(translator.batches.load(Ordering::SeqCst), 2);
    let rendered = doc.render();
    assert!(rendered.contains(",,{\\an8}[0] Good morning\\NGood morning\n"));
}

#[tokio::test]
async fn count_mismatch_fails_without_touching_document() {
    let translator = LlmTranslator::new(
        Box::new(CannedBackend {
            response: "[{\"index\": 0, \"text\": \"only one\"}]".to_string(),
        }),
        options(false, 50).translate,
    );

    let mut doc = SubtitleDocument::parse(Format::Ass, ASS).unwrap();
    let err = translate_document(&mut doc, Arc::new(translator), &options(false, 50))
        .await
        .unwrap_err();

    match err {
        LipiError::UnitFailed { kind, index, source } => {
            assert_eq!(kind, "batch");
            assert_eq!(index, 0);
            assert!(matches!(
                *source,
                LipiError::ResultCountMismatch {
                    expected: 2,
                    actual: 1
                }
            ));
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(doc.render(), ASS);
}
