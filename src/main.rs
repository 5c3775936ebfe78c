//! Lipi - AI subtitle generation and translation
//!
//! Entry point: parses the command line, sets up logging, loads the
//! configuration and hands the command to the workflow.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use std::time::Duration;
use tracing::{Level, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use lipi::cli::{Args, Commands};
use lipi::config::Config;
use lipi::media::{AudioFormat, AudioOptions};
use lipi::subtitle::Format;
use lipi::transcribe::{TranscribeOptions, TranscriptionProvider};
use lipi::translate::{TranslateOptions, TranslationProvider};
use lipi::workflow::{ExtractOptions, GenerateOptions, SubtitleTranslateOptions, Workflow};

const DEFAULT_CONFIG_FILE: &str = "config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(args.verbose)?;
    info!("Starting Lipi");

    let config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };

    match args.command {
        Commands::Generate {
            input,
            output,
            format,
            chunk_minutes,
            concurrency,
            provider,
            model,
            language,
            transcript_language,
            prompt,
            api_key,
        } => {
            let settings = &config.transcribe;
            let provider_name = provider.unwrap_or_else(|| settings.provider.clone());
            let provider: TranscriptionProvider = provider_name.parse()?;
            let chunk_minutes = chunk_minutes.unwrap_or(settings.chunk_minutes);

            let options = GenerateOptions {
                output,
                format: format.parse::<Format>()?,
                chunk_duration: Duration::from_secs(chunk_minutes * 60),
                concurrency: concurrency.unwrap_or(settings.concurrency),
                provider,
                api_key: resolve_api_key(api_key, &config, &provider_name),
                transcribe: TranscribeOptions {
                    language: language.or_else(|| settings.language.clone()),
                    transcript_language: transcript_language
                        .unwrap_or_else(|| settings.transcript_language.clone()),
                    model: model.or_else(|| settings.model.clone()),
                    prompt: prompt.or_else(|| settings.prompt.clone()),
                },
            };

            let workflow = Workflow::new(config.clone());
            let written = workflow.generate(&input, options).await?;
            println!("Subtitles written to {}", written.display());
        }
        Commands::Translate {
            input,
            target,
            overlay,
            output,
            language,
            provider,
            model,
            concurrency,
            batch_size,
            prompt,
            api_key,
        } => {
            let settings = &config.translate;
            let provider_name = provider.unwrap_or_else(|| settings.provider.clone());
            let provider: TranslationProvider = provider_name.parse()?;

            let options = SubtitleTranslateOptions {
                output,
                overlay,
                concurrency: concurrency.unwrap_or(settings.concurrency),
                batch_size: batch_size.unwrap_or(settings.batch_size),
                provider,
                api_key: resolve_api_key(api_key, &config, &provider_name),
                translate: TranslateOptions {
                    target_language: target,
                    input_language: language,
                    model: model.or_else(|| settings.model.clone()),
                    prompt: prompt.or_else(|| settings.prompt.clone()),
                },
            };

            let workflow = Workflow::new(config.clone());
            let written = workflow.translate(&input, options).await?;
            println!("Translation written to {}", written.display());
        }
        Commands::Extract {
            input,
            output,
            format,
            sample_rate,
            channels,
            bitrate,
        } => {
            info!("Extracting audio from: {}", input.display());
            let options = ExtractOptions {
                output,
                audio: AudioOptions {
                    format: format.parse::<AudioFormat>()?,
                    sample_rate,
                    channels,
                    bitrate,
                },
            };

            let workflow = Workflow::new(config.clone());
            let written = workflow.extract(&input, options).await?;
            println!("Audio written to {}", written.display());
        }
        Commands::InitConfig { path } => {
            if path.exists() {
                anyhow::bail!("{} already exists", path.display());
            }
            Config::default().save_to_file(&path)?;
            println!("Configuration written to {}", path.display());
        }
    }

    info!("Lipi completed successfully");
    Ok(())
}

/// Command line key first, then the config file's key for the provider
fn resolve_api_key(cli_key: Option<String>, config: &Config, provider: &str) -> String {
    cli_key
        .filter(|k| !k.trim().is_empty())
        .or_else(|| config.api_keys.for_provider(provider))
        .unwrap_or_default()
}

/// Setup logging to both console and file
fn setup_logging(verbose: bool) -> Result<()> {
    let log_dir = std::env::current_dir()?.join(".lipi").join("log");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = rolling::daily(&log_dir, "lipi.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_file(verbose)
        .with_line_number(verbose);

    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("lipi.log").display()
    );

    Ok(())
}
