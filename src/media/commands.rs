use std::path::Path;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

use super::AudioOptions;
use crate::error::{LipiError, Result};

/// Abstract media processing command representation
#[derive(Debug, Clone)]
pub struct MediaCommand {
    pub binary_path: String,
    pub args: Vec<String>,
    pub description: String,
}

impl MediaCommand {
    /// Create a new media processing command
    pub fn new<S1: Into<String>, S2: Into<String>>(binary_path: S1, description: S2) -> Self {
        Self {
            binary_path: binary_path.into(),
            args: Vec::new(),
            description: description.into(),
        }
    }

    /// Add an argument
    pub fn arg<S: Into<String>>(mut self, arg: S) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(|s| s.into()));
        self
    }

    /// Add input file
    pub fn input<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg("-i").arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Add output file
    pub fn output<P: AsRef<Path>>(self, path: P) -> Self {
        self.arg(path.as_ref().to_string_lossy().to_string())
    }

    /// Force overwrite output
    pub fn overwrite(self) -> Self {
        self.arg("-y")
    }

    /// Set audio codec
    pub fn audio_codec<S: Into<String>>(self, codec: S) -> Self {
        self.arg("-c:a").arg(codec)
    }

    /// Copy every stream without re-encoding
    pub fn copy_streams(self) -> Self {
        self.arg("-c").arg("copy")
    }

    /// Disable video
    pub fn no_video(self) -> Self {
        self.arg("-vn")
    }

    /// Set audio sample rate
    pub fn audio_sample_rate(self, rate: u32) -> Self {
        self.arg("-ar").arg(rate.to_string())
    }

    /// Set audio channels
    pub fn audio_channels(self, channels: u32) -> Self {
        self.arg("-ac").arg(channels.to_string())
    }

    /// Set audio bitrate, e.g. "64k"
    pub fn audio_bitrate<S: Into<String>>(self, bitrate: S) -> Self {
        self.arg("-b:a").arg(bitrate)
    }

    /// Start reading at an offset
    pub fn seek(self, offset: Duration) -> Self {
        self.arg("-ss").arg(seconds(offset))
    }

    /// Limit the output length
    pub fn duration(self, length: Duration) -> Self {
        self.arg("-t").arg(seconds(length))
    }

    /// Apply audio options: codec, sample rate, channels and bitrate
    pub fn audio_options(self, options: &AudioOptions) -> Self {
        let cmd = self
            .audio_codec(options.format.codec())
            .audio_sample_rate(options.sample_rate)
            .audio_channels(options.channels);

        match (&options.bitrate, options.format.is_lossy()) {
            (Some(bitrate), true) => cmd.audio_bitrate(bitrate.clone()),
            _ => cmd,
        }
    }

    /// Execute the command
    pub async fn execute(&self) -> Result<()> {
        self.run().await.map(|_| ())
    }

    /// Execute the command and return its standard output
    pub async fn output_text(&self) -> Result<String> {
        let stdout = self.run().await?;
        Ok(String::from_utf8_lossy(&stdout).to_string())
    }

    async fn run(&self) -> Result<Vec<u8>> {
        debug!("Executing media processing command: {} {:?}", self.binary_path, self.args);
        debug!("Description: {}", self.description);

        let output = Command::new(&self.binary_path)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| LipiError::Media(format!("Failed to execute {}: {}", self.binary_path, e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(LipiError::Media(format!(
                "{} failed: {}",
                self.description,
                stderr.trim()
            )));
        }

        Ok(output.stdout)
    }
}

fn seconds(d: Duration) -> String {
    format!("{:.3}", d.as_secs_f64())
}

/// Builder for common media processing operations
#[derive(Debug, Clone)]
pub struct MediaCommandBuilder {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl MediaCommandBuilder {
    /// Create a new command builder
    pub fn new<S1: Into<String>, S2: Into<String>>(ffmpeg_path: S1, ffprobe_path: S2) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }

    /// Build audio extraction command
    pub fn extract_audio<P: AsRef<Path>>(
        &self,
        video_path: P,
        audio_path: P,
        options: &AudioOptions,
    ) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Audio extraction")
            .input(video_path)
            .no_video()
            .audio_options(options)
            .overwrite()
            .output(audio_path)
    }

    /// Build audio compression command
    pub fn compress_audio<P: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: P,
        options: &AudioOptions,
    ) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Audio compression")
            .input(input_path)
            .no_video()
            .audio_options(options)
            .overwrite()
            .output(output_path)
    }

    /// Build a stream-copy cut of `[start, start + length)`
    pub fn cut_chunk<P: AsRef<Path>>(
        &self,
        input_path: P,
        output_path: P,
        start: Duration,
        length: Duration,
    ) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Audio chunking")
            .input(input_path)
            .seek(start)
            .duration(length)
            .copy_streams()
            .overwrite()
            .output(output_path)
    }

    /// Build an ffprobe query for the container duration
    pub fn probe_duration<P: AsRef<Path>>(&self, path: P) -> MediaCommand {
        MediaCommand::new(&self.ffprobe_path, "Duration probe")
            .args(["-v", "quiet", "-print_format", "json", "-show_format"])
            .output(path)
    }

    /// Build version check command
    pub fn version_check(&self) -> MediaCommand {
        MediaCommand::new(&self.ffmpeg_path, "Version check").arg("-version")
    }
}
