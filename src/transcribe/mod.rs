// Speech-to-text over hosted providers
//
// - Gemini: uploads the audio and asks for a JSON transcript
// - OpenAI: Whisper `verbose_json` segments
//
// Long media is cut into chunks first; `transcribe_chunks` runs them through
// the pipeline and shifts every segment by its chunk's start offset.

pub mod gemini;
pub mod openai;

use async_trait::async_trait;
use indicatif::ProgressBar;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::error::{LipiError, Result};
use crate::media::Chunk;
use crate::pipeline::{UnitProcessor, run_concurrent};
use crate::subtitle::Segment;

/// Transcript of one audio file
#[derive(Debug, Clone, Default)]
pub struct Transcription {
    pub segments: Vec<Segment>,
    pub language: Option<String>,
    pub duration: Duration,
}

/// Options shared by every transcriber
#[derive(Debug, Clone)]
pub struct TranscribeOptions {
    /// Spoken language hint
    pub language: Option<String>,
    /// Output language for the transcript; "native" keeps the spoken language
    pub transcript_language: String,
    pub model: Option<String>,
    /// Extra instructions appended to the request
    pub prompt: Option<String>,
}

impl Default for TranscribeOptions {
    fn default() -> Self {
        Self {
            language: None,
            transcript_language: "native".to_string(),
            model: None,
            prompt: None,
        }
    }
}

/// Main trait for transcription operations
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe one audio file; timestamps are relative to its start
    async fn transcribe(&self, audio_path: &Path) -> Result<Transcription>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptionProvider {
    Gemini,
    OpenAi,
}

impl FromStr for TranscriptionProvider {
    type Err = LipiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAi),
            _ => Err(LipiError::Config(format!(
                "Invalid transcription provider '{}'. Valid providers: gemini, openai",
                s
            ))),
        }
    }
}

impl fmt::Display for TranscriptionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gemini => f.write_str("gemini"),
            Self::OpenAi => f.write_str("openai"),
        }
    }
}

/// Factory for creating transcriber instances
pub struct TranscriberFactory;

impl TranscriberFactory {
    pub fn create_transcriber(
        provider: TranscriptionProvider,
        api_key: &str,
        options: TranscribeOptions,
    ) -> Result<Box<dyn Transcriber>> {
        Ok(match provider {
            TranscriptionProvider::Gemini => {
                Box::new(gemini::GeminiTranscriber::new(api_key, options)?)
            }
            TranscriptionProvider::OpenAi => {
                Box::new(openai::OpenAiTranscriber::new(api_key, options)?)
            }
        })
    }
}

/// Pipeline processor that transcribes a chunk and moves it onto the media timeline
pub struct ChunkTranscription {
    transcriber: Arc<dyn Transcriber>,
    progress: Option<ProgressBar>,
}

impl ChunkTranscription {
    pub fn new(transcriber: Arc<dyn Transcriber>) -> Self {
        Self {
            transcriber,
            progress: None,
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }
}

#[async_trait]
impl UnitProcessor<Chunk> for ChunkTranscription {
    type Output = Segment;

    async fn process(&self, chunk: Chunk) -> Result<Vec<Segment>> {
        let transcription = self.transcriber.transcribe(&chunk.path).await?;
        if let Some(progress) = &self.progress {
            progress.inc(1);
        }

        let offset = |time: Duration| {
            time.checked_add(chunk.start).ok_or_else(|| {
                LipiError::Provider(format!("segment time out of range in chunk {}", chunk.index))
            })
        };

        transcription
            .segments
            .into_iter()
            .map(|segment| {
                Ok(Segment {
                    start: offset(segment.start)?,
                    end: offset(segment.end)?,
                    text: segment.text,
                })
            })
            .collect()
    }
}

/// Transcribe chunks concurrently and merge them into one timeline
pub async fn transcribe_chunks(
    processor: ChunkTranscription,
    chunks: Vec<Chunk>,
    concurrency: usize,
    language: Option<String>,
) -> Result<Transcription> {
    let duration = chunks.iter().map(|c| c.end).max().unwrap_or_default();
    info!("Transcribing {} chunks with concurrency {}", chunks.len(), concurrency);

    let segments = run_concurrent(chunks, concurrency, Arc::new(processor)).await?;

    Ok(Transcription {
        segments,
        language,
        duration,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// Returns one segment per file at 1s..2s and records the calls
    struct FixedTranscriber {
        seen: Mutex<Vec<PathBuf>>,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl Transcriber for FixedTranscriber {
        async fn transcribe(&self, audio_path: &Path) -> Result<Transcription> {
            self.seen.lock().unwrap().push(audio_path.to_path_buf());
            let name = audio_path.file_name().unwrap().to_string_lossy().to_string();
            if Some(name.as_str()) == self.fail_on {
                return Err(LipiError::Provider("quota".to_string()));
            }
            Ok(Transcription {
                segments: vec![Segment {
                    start: Duration::from_secs(1),
                    end: Duration::from_secs(2),
                    text: name,
                }],
                language: None,
                duration: Duration::from_secs(60),
            })
        }
    }

    fn chunk(index: usize) -> Chunk {
        Chunk {
            path: PathBuf::from(format!("chunk_{:03}.mp3", index)),
            index,
            start: Duration::from_secs(60 * index as u64),
            end: Duration::from_secs(60 * (index as u64 + 1)),
        }
    }

    /// Reports a segment at the largest representable time
    struct FarFutureTranscriber;

    #[async_trait]
    impl Transcriber for FarFutureTranscriber {
        async fn transcribe(&self, _audio_path: &Path) -> Result<Transcription> {
            Ok(Transcription {
                segments: vec![Segment {
                    start: Duration::MAX,
                    end: Duration::MAX,
                    text: "late".to_string(),
                }],
                language: None,
                duration: Duration::MAX,
            })
        }
    }

    #[tokio::test]
    async fn test_out_of_range_segment_time_is_error() {
        let processor = ChunkTranscription::new(Arc::new(FarFutureTranscriber));
        let err = processor.process(chunk(1)).await.unwrap_err();
        assert!(matches!(err, LipiError::Provider(ref m) if m.contains("chunk 1")));

        // The first chunk starts at zero, so nothing is added.
        let segments = processor.process(chunk(0)).await.unwrap();
        assert_eq!(segments[0].start, Duration::MAX);
    }

    #[tokio::test]
    async fn test_chunks_are_offset_and_ordered() {
        let transcriber = Arc::new(FixedTranscriber {
            seen: Mutex::new(Vec::new()),
            fail_on: None,
        });
        let processor = ChunkTranscription::new(transcriber.clone());
        let result = transcribe_chunks(processor, (0..4).map(chunk).collect(), 3, Some("en".to_string()))
            .await
            .unwrap();

        assert_eq!(result.segments.len(), 4);
        assert_eq!(result.segments[2].start, Duration::from_secs(121));
        assert_eq!(result.segments[2].end, Duration::from_secs(122));
        assert_eq!(result.segments[3].text, "chunk_003.mp3");
        assert_eq!(result.duration, Duration::from_secs(240));
        assert_eq!(result.language.as_deref(), Some("en"));
        assert_eq!(transcriber.seen.lock().unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_chunk_failure_names_chunk() {
        let transcriber = Arc::new(FixedTranscriber {
            seen: Mutex::new(Vec::new()),
            fail_on: Some("chunk_001.mp3"),
        });
        let err = transcribe_chunks(ChunkTranscription::new(transcriber), (0..2).map(chunk).collect(), 1, None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "chunk 1 failed: Provider error: quota");
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("Gemini".parse::<TranscriptionProvider>().unwrap(), TranscriptionProvider::Gemini);
        assert_eq!("openai".parse::<TranscriptionProvider>().unwrap(), TranscriptionProvider::OpenAi);
        assert!("whisper".parse::<TranscriptionProvider>().is_err());
    }
}
