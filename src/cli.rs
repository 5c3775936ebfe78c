use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Transcribe a video or audio file into subtitles
    Generate {
        /// Input video or audio file
        input: PathBuf,

        /// Output subtitle file (defaults to the input path with the format's extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Subtitle format: srt, vtt or ass
        #[arg(short, long, default_value = "srt")]
        format: String,

        /// Chunk length in minutes
        #[arg(short = 'd', long)]
        chunk_minutes: Option<u64>,

        /// Chunks transcribed at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Transcription provider: gemini or openai
        #[arg(long)]
        provider: Option<String>,

        /// Model override
        #[arg(long)]
        model: Option<String>,

        /// Spoken language hint
        #[arg(short, long)]
        language: Option<String>,

        /// Transcript language ("native" keeps the spoken language)
        #[arg(long)]
        transcript_language: Option<String>,

        /// Extra instructions for the transcription prompt
        #[arg(long)]
        prompt: Option<String>,

        /// API key (overrides the config file)
        #[arg(short = 'k', long)]
        api_key: Option<String>,
    },

    /// Translate a subtitle file
    Translate {
        /// Input subtitle file (.srt, .vtt, .ass, .ssa)
        input: PathBuf,

        /// Target language
        #[arg(short, long)]
        target: String,

        /// Keep the original text under each translation
        #[arg(long)]
        overlay: bool,

        /// Output subtitle file
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Source language hint
        #[arg(short, long)]
        language: Option<String>,

        /// Translation provider: gemini, openai or anthropic
        #[arg(long)]
        provider: Option<String>,

        /// Model override
        #[arg(long)]
        model: Option<String>,

        /// Batches translated at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Entries per request
        #[arg(long)]
        batch_size: Option<usize>,

        /// Extra instructions for the translation prompt
        #[arg(long)]
        prompt: Option<String>,

        /// API key (overrides the config file)
        #[arg(short = 'k', long)]
        api_key: Option<String>,
    },

    /// Extract audio from video file
    Extract {
        /// Input video file
        input: PathBuf,

        /// Output audio file (defaults to the input path with the format's extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Audio format: wav, mp3, aac or flac
        #[arg(short, long, default_value = "wav")]
        format: String,

        #[arg(long, default_value_t = 16000)]
        sample_rate: u32,

        #[arg(long, default_value_t = 1)]
        channels: u32,

        /// Bitrate for lossy formats, e.g. 128k
        #[arg(long)]
        bitrate: Option<String>,
    },

    /// Write a configuration file with default values
    InitConfig {
        /// Destination path
        #[arg(default_value = "config.toml")]
        path: PathBuf,
    },
}
