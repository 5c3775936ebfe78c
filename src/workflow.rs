use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{LipiError, Result};
use crate::media::{
    AudioOptions, MediaTool, MediaToolFactory, cleanup_chunks, is_audio_file, is_media_file,
    is_video_file,
};
use crate::subtitle::{Format, GeneratorSettings, SubtitleDocument, SubtitleGenerator};
use crate::transcribe::{
    ChunkTranscription, TranscribeOptions, Transcriber, TranscriberFactory, TranscriptionProvider,
    transcribe_chunks,
};
use crate::translate::{
    BatchTranslation, TranslateOptions, TranslationItem, TranslationProvider, TranslationResult,
    Translator, TranslatorFactory, translate_concurrently,
};

/// Settings for turning media into a subtitle file
#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub output: Option<PathBuf>,
    pub format: Format,
    pub chunk_duration: Duration,
    pub concurrency: usize,
    pub provider: TranscriptionProvider,
    pub api_key: String,
    pub transcribe: TranscribeOptions,
}

/// Settings for translating a subtitle file
#[derive(Debug, Clone)]
pub struct SubtitleTranslateOptions {
    pub output: Option<PathBuf>,
    pub overlay: bool,
    pub concurrency: usize,
    pub batch_size: usize,
    pub provider: TranslationProvider,
    pub api_key: String,
    pub translate: TranslateOptions,
}

impl SubtitleTranslateOptions {
    pub fn validate(&self) -> Result<()> {
        let target = self.translate.target_language.trim();
        if target.is_empty() {
            return Err(LipiError::Config("target language is required".to_string()));
        }
        if let Some(input) = &self.translate.input_language {
            if input.trim().eq_ignore_ascii_case(target) {
                return Err(LipiError::Config(format!(
                    "input and target language are both '{}'",
                    target
                )));
            }
        }
        if self.concurrency == 0 {
            return Err(LipiError::Config("concurrency must be positive".to_string()));
        }
        if self.batch_size == 0 {
            return Err(LipiError::Config("batch size must be positive".to_string()));
        }
        Ok(())
    }
}

/// Settings for pulling the audio track out of a video
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub output: Option<PathBuf>,
    pub audio: AudioOptions,
}

pub struct Workflow {
    config: Config,
    media: Box<dyn MediaTool>,
}

impl Workflow {
    pub fn new(config: Config) -> Self {
        let media = MediaToolFactory::create_tool(config.media.clone());
        Self { config, media }
    }

    /// Transcribe a video or audio file and write subtitles
    pub async fn generate<P: AsRef<Path>>(
        &self,
        media_path: P,
        options: GenerateOptions,
    ) -> Result<PathBuf> {
        let media_path = media_path.as_ref();
        info!("Generating subtitles for: {}", media_path.display());

        if !media_path.exists() {
            return Err(LipiError::FileNotFound(media_path.display().to_string()));
        }
        if !is_media_file(media_path) {
            return Err(LipiError::UnsupportedFormat(media_path.display().to_string()));
        }
        if options.chunk_duration.is_zero() {
            return Err(LipiError::Config("chunk length must be positive".to_string()));
        }

        self.media.check_availability().await?;

        // Chunks and the upload copy live only as long as this directory
        let work_dir = tempfile::tempdir()?;
        let audio_options = AudioOptions::compression();
        let audio_path = work_dir
            .path()
            .join(format!("audio.{}", audio_options.format.extension()));

        if is_video_file(media_path) {
            self.media
                .extract_audio(media_path, &audio_path, &audio_options)
                .await?;
        } else {
            self.media
                .compress_audio(media_path, &audio_path, &audio_options)
                .await?;
        }

        let chunks = self
            .media
            .split_into_chunks(
                &audio_path,
                options.chunk_duration,
                &work_dir.path().join("chunks"),
                self.config.media.chunk_concurrency,
            )
            .await?;
        if chunks.is_empty() {
            return Err(LipiError::Media(format!(
                "no audio found in {}",
                media_path.display()
            )));
        }

        let language = options.transcribe.language.clone();
        let transcriber: Arc<dyn Transcriber> = Arc::from(TranscriberFactory::create_transcriber(
            options.provider,
            &options.api_key,
            options.transcribe,
        )?);

        let progress = progress_bar(chunks.len() as u64, "Transcribing");
        let processor = ChunkTranscription::new(transcriber).with_progress(progress.clone());
        let transcription =
            transcribe_chunks(processor, chunks.clone(), options.concurrency, language).await;
        progress.finish_and_clear();

        if let Err(e) = cleanup_chunks(&chunks) {
            warn!("Failed to clean up chunks: {}", e);
        }
        let transcription = transcription?;
        info!(
            "Transcribed {} segments covering {:.1}s",
            transcription.segments.len(),
            transcription.duration.as_secs_f64()
        );

        let entries =
            SubtitleGenerator::new(GeneratorSettings::default()).generate(&transcription.segments);
        let document = SubtitleDocument::from_entries(options.format, entries);

        let output = options
            .output
            .unwrap_or_else(|| media_path.with_extension(options.format.extension()));
        document.write(&output)?;

        info!("Generated {} subtitles: {}", document.len(), output.display());
        Ok(output)
    }

    /// Translate a subtitle file and write the result
    pub async fn translate<P: AsRef<Path>>(
        &self,
        subtitle_path: P,
        options: SubtitleTranslateOptions,
    ) -> Result<PathBuf> {
        let subtitle_path = subtitle_path.as_ref();
        info!("Translating subtitles: {}", subtitle_path.display());
        options.validate()?;

        let mut document = SubtitleDocument::open(subtitle_path)?;
        if document.is_empty() {
            return Err(LipiError::EmptyDocument(subtitle_path.display().to_string()));
        }

        let output = options.output.clone().unwrap_or_else(|| {
            default_translation_output(
                subtitle_path,
                &options.translate.target_language,
                options.overlay,
            )
        });

        let translator: Arc<dyn Translator> = Arc::from(TranslatorFactory::create_translator(
            options.provider,
            &options.api_key,
            options.translate.clone(),
        )?);

        translate_document(&mut document, translator, &options).await?;
        document.write(&output)?;

        info!("Translated subtitles written to: {}", output.display());
        Ok(output)
    }

    /// Extract audio from video file
    pub async fn extract<P: AsRef<Path>>(
        &self,
        video_path: P,
        options: ExtractOptions,
    ) -> Result<PathBuf> {
        let video_path = video_path.as_ref();
        if !video_path.exists() {
            return Err(LipiError::FileNotFound(video_path.display().to_string()));
        }
        if is_audio_file(video_path) && !is_video_file(video_path) {
            warn!("{} is already an audio file, re-encoding", video_path.display());
        }

        self.media.check_availability().await?;

        let output = options
            .output
            .unwrap_or_else(|| video_path.with_extension(options.audio.format.extension()));
        if output.as_path() == video_path {
            return Err(LipiError::Config(format!(
                "output would overwrite the input {}",
                video_path.display()
            )));
        }

        self.media
            .extract_audio(video_path, &output, &options.audio)
            .await?;
        Ok(output)
    }
}

/// Translate every entry of `document` in place
pub async fn translate_document(
    document: &mut SubtitleDocument,
    translator: Arc<dyn Translator>,
    options: &SubtitleTranslateOptions,
) -> Result<()> {
    let items: Vec<TranslationItem> = document
        .entries()
        .into_iter()
        .enumerate()
        .map(|(index, entry)| TranslationItem {
            index,
            text: entry.text,
        })
        .collect();

    let progress = progress_bar(items.len() as u64, "Translating");
    let processor = BatchTranslation::new(translator).with_progress(progress.clone());
    let results =
        translate_concurrently(processor, items, options.batch_size, options.concurrency).await;
    progress.finish_and_clear();

    let applied = apply_translations(document, &results?, options.overlay)?;
    info!("Applied {} of {} translations", applied, document.len());
    Ok(())
}

/// Write translated text back by position. Returns how many were applied.
pub fn apply_translations(
    document: &mut SubtitleDocument,
    results: &[TranslationResult],
    overlay: bool,
) -> Result<usize> {
    let originals: Vec<String> = document.entries().into_iter().map(|e| e.text).collect();
    let mut applied = 0;

    for result in results {
        let Some(original) = originals.get(result.index) else {
            warn!(
                "Skipping translation for index {} (document has {} entries)",
                result.index,
                originals.len()
            );
            continue;
        };

        if !overlay {
            document.set_text(result.index, &result.text)?;
        } else if let Some(ass) = document.as_ass_mut() {
            ass.set_text_with_overlay(result.index, &result.text)?;
        } else {
            document.set_text(result.index, &format!("{}\n{}", result.text, original))?;
        }
        applied += 1;
    }

    Ok(applied)
}

/// `<stem>.<target>[.overlay].<ext>` beside the input
pub fn default_translation_output(input: &Path, target_language: &str, overlay: bool) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "subtitles".to_string());
    let ext = input
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| "srt".to_string());
    let suffix = if overlay { ".overlay" } else { "" };

    input.with_file_name(format!("{}.{}{}.{}", stem, target_language, suffix, ext))
}

fn progress_bar(len: u64, message: &'static str) -> ProgressBar {
    let pb = ProgressBar::new(len);
    if let Ok(style) =
        ProgressStyle::with_template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len}")
    {
        pb.set_style(style.progress_chars("#>-"));
    }
    pb.set_message(message);
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    const SRT: &str = "1\n00:00:01,000 --> 00:00:02,000\nHello\n\n2\n00:00:03,000 --> 00:00:04,000\nWorld\n";

    fn options() -> SubtitleTranslateOptions {
        SubtitleTranslateOptions {
            output: None,
            overlay: false,
            concurrency: 3,
            batch_size: 50,
            provider: TranslationProvider::Gemini,
            api_key: "key".to_string(),
            translate: TranslateOptions {
                target_language: "ja".to_string(),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_validate() {
        assert!(options().validate().is_ok());

        let mut same = options();
        same.translate.input_language = Some("JA".to_string());
        assert!(matches!(same.validate(), Err(LipiError::Config(_))));

        let mut no_target = options();
        no_target.translate.target_language = " ".to_string();
        assert!(no_target.validate().is_err());

        let mut zero = options();
        zero.batch_size = 0;
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_default_translation_output() {
        assert_eq!(
            default_translation_output(Path::new("/subs/movie.srt"), "ja", false),
            PathBuf::from("/subs/movie.ja.srt")
        );
        assert_eq!(
            default_translation_output(Path::new("movie.en.ass"), "fr", true),
            PathBuf::from("movie.en.fr.overlay.ass")
        );
    }

    #[test]
    fn test_apply_translations_skips_out_of_range() {
        let mut doc = SubtitleDocument::parse(Format::Srt, SRT).unwrap();
        let results = vec![
            TranslationResult {
                index: 1,
                text: "世界".to_string(),
            },
            TranslationResult {
                index: 7,
                text: "ghost".to_string(),
            },
        ];

        assert_eq!(apply_translations(&mut doc, &results, false).unwrap(), 1);
        let entries = doc.entries();
        assert_eq!(entries[0].text, "Hello");
        assert_eq!(entries[1].text, "世界");
    }

    #[test]
    fn test_apply_translations_overlay_plain_text() {
        let mut doc = SubtitleDocument::parse(Format::Srt, SRT).unwrap();
        let results = vec![TranslationResult {
            index: 0,
            text: "こんにちは".to_string(),
        }];

        apply_translations(&mut doc, &results, true).unwrap();
        assert_eq!(doc.entries()[0].text, "こんにちは\nHello");
    }

    #[tokio::test]
    async fn test_translate_missing_file() {
        let workflow = Workflow::new(Config::default());
        let err = workflow
            .translate("/nonexistent/movie.srt", options())
            .await
            .unwrap_err();
        assert!(matches!(err, LipiError::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_generate_rejects_non_media() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        std::fs::write(&path, "text").unwrap();

        let workflow = Workflow::new(Config::default());
        let err = workflow
            .generate(
                &path,
                GenerateOptions {
                    output: None,
                    format: Format::Srt,
                    chunk_duration: Duration::from_secs(60),
                    concurrency: 3,
                    provider: TranscriptionProvider::Gemini,
                    api_key: "key".to_string(),
                    transcribe: TranscribeOptions::default(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LipiError::UnsupportedFormat(_)));
    }
}
