//! Lipi - AI subtitle generation and translation
//!
//! Transcribes video and audio into subtitles with hosted speech models and
//! translates SRT, WebVTT and ASS files with hosted LLMs, keeping ASS styling
//! intact.

pub mod cli;
pub mod config;
pub mod error;
pub mod media;
pub mod pipeline;
pub mod providers;
pub mod recovery;
pub mod subtitle;
pub mod transcribe;
pub mod translate;
pub mod workflow;
