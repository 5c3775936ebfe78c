// Subtitle document model
//
// A document is one of three closed variants:
// - Srt / Vtt: ordered cue lists, rewritten canonically on save
// - Ass: verbatim layout with editable Dialogue text, see `ass`
//
// Positions passed to `set_text` are 0-based; `Entry::index` is 1-based display order.

pub mod ass;
pub mod generator;
pub mod srt;
pub mod timecode;
pub mod vtt;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

pub use ass::AssDocument;
pub use generator::{GeneratorSettings, SubtitleGenerator};
pub use srt::SrtDocument;
pub use vtt::VttDocument;

use crate::error::{LipiError, Result};

/// A single displayed subtitle cue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub index: usize,
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

/// A timed piece of transcript text
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub start: Duration,
    pub end: Duration,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Srt,
    Vtt,
    Ass,
}

impl Format {
    /// Detect the format from a file extension
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "srt" => Ok(Format::Srt),
            "vtt" => Ok(Format::Vtt),
            "ass" | "ssa" => Ok(Format::Ass),
            _ => Err(LipiError::UnsupportedFormat(format!(
                "{} (expected .srt, .vtt, .ass or .ssa)",
                path.display()
            ))),
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Format::Srt => "srt",
            Format::Vtt => "vtt",
            Format::Ass => "ass",
        }
    }
}

impl FromStr for Format {
    type Err = LipiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "srt" => Ok(Format::Srt),
            "vtt" | "webvtt" => Ok(Format::Vtt),
            "ass" | "ssa" => Ok(Format::Ass),
            _ => Err(LipiError::UnsupportedFormat(format!(
                "'{}'. Valid formats: srt, vtt, ass",
                s
            ))),
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// A parsed subtitle file
#[derive(Debug, Clone)]
pub enum SubtitleDocument {
    Srt(SrtDocument),
    Vtt(VttDocument),
    Ass(AssDocument),
}

impl SubtitleDocument {
    /// Open a subtitle file, choosing the parser by extension
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let format = Format::from_path(path)?;

        if !path.exists() {
            return Err(LipiError::FileNotFound(path.display().to_string()));
        }

        let content = std::fs::read_to_string(path)?;
        let document = Self::parse(format, &content)?;
        debug!(
            "Opened {} subtitle {} with {} entries",
            format,
            path.display(),
            document.len()
        );
        Ok(document)
    }

    /// Parse in-memory subtitle text
    pub fn parse(format: Format, content: &str) -> Result<Self> {
        Ok(match format {
            Format::Srt => SubtitleDocument::Srt(SrtDocument::parse(content)?),
            Format::Vtt => SubtitleDocument::Vtt(VttDocument::parse(content)?),
            Format::Ass => SubtitleDocument::Ass(AssDocument::parse(content)?),
        })
    }

    /// Build a fresh document from entries
    pub fn from_entries(format: Format, entries: Vec<Entry>) -> Self {
        match format {
            Format::Srt => SubtitleDocument::Srt(SrtDocument::from_entries(entries)),
            Format::Vtt => SubtitleDocument::Vtt(VttDocument::from_entries(entries)),
            Format::Ass => SubtitleDocument::Ass(AssDocument::from_entries(&entries)),
        }
    }

    pub fn format(&self) -> Format {
        match self {
            SubtitleDocument::Srt(_) => Format::Srt,
            SubtitleDocument::Vtt(_) => Format::Vtt,
            SubtitleDocument::Ass(_) => Format::Ass,
        }
    }

    /// Snapshot of the current entries
    pub fn entries(&self) -> Vec<Entry> {
        match self {
            SubtitleDocument::Srt(doc) => doc.entries(),
            SubtitleDocument::Vtt(doc) => doc.entries(),
            SubtitleDocument::Ass(doc) => doc.entries(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SubtitleDocument::Srt(doc) => doc.len(),
            SubtitleDocument::Vtt(doc) => doc.len(),
            SubtitleDocument::Ass(doc) => doc.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Replace the text at a 0-based position
    pub fn set_text(&mut self, position: usize, text: &str) -> Result<()> {
        match self {
            SubtitleDocument::Srt(doc) => doc.set_text(position, text),
            SubtitleDocument::Vtt(doc) => doc.set_text(position, text),
            SubtitleDocument::Ass(doc) => doc.set_text(position, text),
        }
    }

    pub fn as_ass_mut(&mut self) -> Option<&mut AssDocument> {
        match self {
            SubtitleDocument::Ass(doc) => Some(doc),
            _ => None,
        }
    }

    /// Serialize to the text `write` would produce
    pub fn render(&self) -> String {
        match self {
            SubtitleDocument::Srt(doc) => doc.render(),
            SubtitleDocument::Vtt(doc) => doc.render(),
            SubtitleDocument::Ass(doc) => doc.render(),
        }
    }

    /// Write the document, creating parent directories as needed
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(path, self.render())?;
        info!("Wrote {} subtitle file: {}", self.format(), path.display());
        Ok(())
    }
}

/// Shared checked lookup for positional cue lists
pub(crate) fn cue_mut(entries: &mut [Entry], position: usize) -> Result<&mut Entry> {
    let len = entries.len();
    entries
        .get_mut(position)
        .ok_or(LipiError::IndexOutOfRange {
            index: position,
            len,
        })
}

/// Renumber entries 1..n in their current order
pub(crate) fn renumber(entries: &mut [Entry]) {
    for (i, entry) in entries.iter_mut().enumerate() {
        entry.index = i + 1;
    }
}

/// Split a `start --> end [settings]` line into its two timestamps
pub(crate) fn split_timing(line: &str) -> Option<(&str, &str)> {
    let (start, rest) = line.split_once("-->")?;
    let end = rest.split_whitespace().next()?;
    Some((start.trim(), end))
}

pub(crate) fn strip_bom(content: &str) -> &str {
    content.strip_prefix('\u{feff}').unwrap_or(content)
}
