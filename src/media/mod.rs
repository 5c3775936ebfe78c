// Media processing over ffmpeg/ffprobe
//
// - Commands: argument builders for ffmpeg and ffprobe invocations
// - Processor: the ffmpeg-backed `MediaTool`, including concurrent chunking

pub mod commands;
pub mod processor;

use async_trait::async_trait;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub use commands::*;
pub use processor::*;

use crate::config::MediaConfig;
use crate::error::{LipiError, Result};
use crate::pipeline::WorkUnit;

const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "wmv", "flv", "webm", "m4v", "mpeg", "mpg", "3gp",
];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "aac", "flac", "ogg", "m4a", "wma", "aiff"];

/// A time slice of an audio file written to its own file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub path: PathBuf,
    pub index: usize,
    pub start: Duration,
    pub end: Duration,
}

impl WorkUnit for Chunk {
    const KIND: &'static str = "chunk";

    fn index(&self) -> usize {
        self.index
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Wav,
    Mp3,
    Aac,
    Flac,
}

impl AudioFormat {
    pub fn codec(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "pcm_s16le",
            AudioFormat::Mp3 => "libmp3lame",
            AudioFormat::Aac => "aac",
            AudioFormat::Flac => "flac",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            AudioFormat::Wav => "wav",
            AudioFormat::Mp3 => "mp3",
            AudioFormat::Aac => "aac",
            AudioFormat::Flac => "flac",
        }
    }

    pub fn is_lossy(&self) -> bool {
        matches!(self, AudioFormat::Mp3 | AudioFormat::Aac)
    }
}

impl FromStr for AudioFormat {
    type Err = LipiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "wav" => Ok(AudioFormat::Wav),
            "mp3" => Ok(AudioFormat::Mp3),
            "aac" => Ok(AudioFormat::Aac),
            "flac" => Ok(AudioFormat::Flac),
            _ => Err(LipiError::UnsupportedFormat(format!(
                "audio format '{}'. Valid formats: wav, mp3, aac, flac",
                s
            ))),
        }
    }
}

impl fmt::Display for AudioFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Encoding settings for extracted or compressed audio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioOptions {
    pub format: AudioFormat,
    pub sample_rate: u32,
    pub channels: u32,
    /// Only applied to lossy formats
    pub bitrate: Option<String>,
}

impl AudioOptions {
    /// Small mono mp3 suited to upload for transcription
    pub fn compression() -> Self {
        Self {
            format: AudioFormat::Mp3,
            sample_rate: 16000,
            channels: 1,
            bitrate: Some("64k".to_string()),
        }
    }

    /// Plain 16 kHz mono wav
    pub fn extraction() -> Self {
        Self {
            format: AudioFormat::Wav,
            sample_rate: 16000,
            channels: 1,
            bitrate: None,
        }
    }
}

/// Main trait for media processing operations
#[async_trait]
pub trait MediaTool: Send + Sync {
    /// Container duration of an audio or video file
    async fn duration(&self, path: &Path) -> Result<Duration>;

    /// Cut audio into consecutive chunks of `chunk_duration` inside `output_dir`
    async fn split_into_chunks(
        &self,
        audio_path: &Path,
        chunk_duration: Duration,
        output_dir: &Path,
        concurrency: usize,
    ) -> Result<Vec<Chunk>>;

    /// Extract the audio track of a video
    async fn extract_audio(
        &self,
        video_path: &Path,
        audio_path: &Path,
        options: &AudioOptions,
    ) -> Result<()>;

    /// Re-encode audio for upload
    async fn compress_audio(
        &self,
        input_path: &Path,
        output_path: &Path,
        options: &AudioOptions,
    ) -> Result<()>;

    /// Check that the media binaries can be run
    async fn check_availability(&self) -> Result<()>;
}

/// Factory for creating media tool instances
pub struct MediaToolFactory;

impl MediaToolFactory {
    /// Create the default media tool implementation (FFmpeg-based)
    pub fn create_tool(config: MediaConfig) -> Box<dyn MediaTool> {
        Box::new(processor::FfmpegMediaTool::new(config))
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .is_some_and(|ext| extensions.contains(&ext.as_str()))
}

pub fn is_video_file(path: &Path) -> bool {
    has_extension(path, VIDEO_EXTENSIONS)
}

pub fn is_audio_file(path: &Path) -> bool {
    has_extension(path, AUDIO_EXTENSIONS)
}

pub fn is_media_file(path: &Path) -> bool {
    is_video_file(path) || is_audio_file(path)
}

/// Remove chunk files, ignoring ones already gone. Returns the last failure.
pub fn cleanup_chunks(chunks: &[Chunk]) -> Result<()> {
    let mut last_error = None;
    for chunk in chunks {
        match std::fs::remove_file(&chunk.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!("Failed to remove chunk {}: {}", chunk.path.display(), e);
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) => Err(e.into()),
        None => Ok(()),
    }
}
