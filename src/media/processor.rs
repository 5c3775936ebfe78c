use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use super::{AudioOptions, Chunk, MediaCommandBuilder, MediaTool};
use crate::config::MediaConfig;
use crate::error::{LipiError, Result};
use crate::pipeline::{UnitProcessor, WorkUnit, run_concurrent};
use crate::subtitle::timecode::from_seconds;

/// Chunk cutting concurrency when the caller passes zero
pub const DEFAULT_CHUNK_CONCURRENCY: usize = 10;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: ProbeFormat,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Parse ffprobe `-show_format` JSON into a duration
pub fn parse_probe_duration(json: &str) -> Result<Duration> {
    let probe: ProbeOutput = serde_json::from_str(json)?;
    let raw = probe
        .format
        .duration
        .ok_or_else(|| LipiError::Media("ffprobe reported no duration".to_string()))?;
    let seconds: f64 = raw
        .trim()
        .parse()
        .map_err(|_| LipiError::Media(format!("invalid duration '{}'", raw)))?;
    Ok(from_seconds(seconds))
}

/// Lay out consecutive chunks covering `total`
pub fn plan_chunks(
    audio_path: &Path,
    total: Duration,
    chunk_duration: Duration,
    output_dir: &Path,
) -> Vec<Chunk> {
    let stem = audio_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "audio".to_string());
    let ext = audio_path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut chunks = Vec::new();
    let mut start = Duration::ZERO;
    while start < total {
        let end = (start + chunk_duration).min(total);
        let index = chunks.len();
        chunks.push(Chunk {
            path: output_dir.join(format!("{}_chunk_{:03}{}", stem, index, ext)),
            index,
            start,
            end,
        });
        start = end;
    }
    chunks
}

/// One ffmpeg cut, run as a pipeline unit
struct ChunkJob {
    source: PathBuf,
    chunk: Chunk,
}

impl WorkUnit for ChunkJob {
    const KIND: &'static str = "chunk";

    fn index(&self) -> usize {
        self.chunk.index
    }
}

struct ChunkCutter {
    command_builder: MediaCommandBuilder,
}

#[async_trait]
impl UnitProcessor<ChunkJob> for ChunkCutter {
    type Output = Chunk;

    async fn process(&self, job: ChunkJob) -> Result<Vec<Chunk>> {
        let chunk = job.chunk;
        self.command_builder
            .cut_chunk(
                job.source.as_path(),
                chunk.path.as_path(),
                chunk.start,
                chunk.end.saturating_sub(chunk.start),
            )
            .execute()
            .await?;
        debug!("Wrote chunk {} to {}", chunk.index, chunk.path.display());
        Ok(vec![chunk])
    }
}

/// Concrete implementation of the media tool (FFmpeg-based)
pub struct FfmpegMediaTool {
    command_builder: MediaCommandBuilder,
}

impl FfmpegMediaTool {
    pub fn new(config: MediaConfig) -> Self {
        Self {
            command_builder: MediaCommandBuilder::new(config.ffmpeg_path, config.ffprobe_path),
        }
    }
}

fn ensure_exists(path: &Path) -> Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(LipiError::FileNotFound(path.display().to_string()))
    }
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

#[async_trait]
impl MediaTool for FfmpegMediaTool {
    async fn duration(&self, path: &Path) -> Result<Duration> {
        ensure_exists(path)?;
        let json = self.command_builder.probe_duration(path).output_text().await?;
        parse_probe_duration(&json)
    }

    async fn split_into_chunks(
        &self,
        audio_path: &Path,
        chunk_duration: Duration,
        output_dir: &Path,
        concurrency: usize,
    ) -> Result<Vec<Chunk>> {
        if chunk_duration.is_zero() {
            return Err(LipiError::Media(
                "chunk duration must be positive".to_string(),
            ));
        }
        let concurrency = if concurrency == 0 {
            DEFAULT_CHUNK_CONCURRENCY
        } else {
            concurrency
        };

        ensure_exists(audio_path)?;
        let total = self.duration(audio_path).await?;
        std::fs::create_dir_all(output_dir)?;

        let jobs: Vec<ChunkJob> = plan_chunks(audio_path, total, chunk_duration, output_dir)
            .into_iter()
            .map(|chunk| ChunkJob {
                source: audio_path.to_path_buf(),
                chunk,
            })
            .collect();

        info!(
            "Splitting {} ({:.1}s) into {} chunks",
            audio_path.display(),
            total.as_secs_f64(),
            jobs.len()
        );

        let cutter = Arc::new(ChunkCutter {
            command_builder: self.command_builder.clone(),
        });
        run_concurrent(jobs, concurrency, cutter).await
    }

    async fn extract_audio(
        &self,
        video_path: &Path,
        audio_path: &Path,
        options: &AudioOptions,
    ) -> Result<()> {
        ensure_exists(video_path)?;
        ensure_parent(audio_path)?;
        info!("Extracting audio from {} to {}", video_path.display(), audio_path.display());

        self.command_builder
            .extract_audio(video_path, audio_path, options)
            .execute()
            .await?;

        info!("Audio extraction completed");
        Ok(())
    }

    async fn compress_audio(
        &self,
        input_path: &Path,
        output_path: &Path,
        options: &AudioOptions,
    ) -> Result<()> {
        ensure_exists(input_path)?;
        ensure_parent(output_path)?;
        info!("Compressing audio {} to {}", input_path.display(), output_path.display());

        self.command_builder
            .compress_audio(input_path, output_path, options)
            .execute()
            .await
    }

    async fn check_availability(&self) -> Result<()> {
        self.command_builder
            .version_check()
            .execute()
            .await
            .map_err(|e| LipiError::Media(format!("ffmpeg is not available: {}", e)))?;
        debug!("Media processor is available");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_duration() {
        let json = r#"{"format": {"filename": "a.mp3", "duration": "125.480000"}}"#;
        assert_eq!(parse_probe_duration(json).unwrap(), Duration::from_millis(125_480));
        assert!(parse_probe_duration(r#"{"format": {}}"#).is_err());
        assert!(parse_probe_duration(r#"{"format": {"duration": "N/A"}}"#).is_err());
    }

    #[test]
    fn test_plan_chunks() {
        let chunks = plan_chunks(
            Path::new("/tmp/in/talk.mp3"),
            Duration::from_secs(150),
            Duration::from_secs(60),
            Path::new("/tmp/work"),
        );
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].path, PathBuf::from("/tmp/work/talk_chunk_000.mp3"));
        assert_eq!(chunks[2].path, PathBuf::from("/tmp/work/talk_chunk_002.mp3"));
        assert_eq!(chunks[2].start, Duration::from_secs(120));
        assert_eq!(chunks[2].end, Duration::from_secs(150));
    }

    #[test]
    fn test_plan_chunks_empty_audio() {
        assert!(plan_chunks(Path::new("a.mp3"), Duration::ZERO, Duration::from_secs(60), Path::new(".")).is_empty());
    }

    #[tokio::test]
    async fn test_zero_chunk_duration_rejected() {
        let tool = FfmpegMediaTool::new(MediaConfig::default());
        let err = tool
            .split_into_chunks(Path::new("a.mp3"), Duration::ZERO, Path::new("."), 0)
            .await
            .unwrap_err();
        assert!(matches!(err, LipiError::Media(_)));
    }
}
