use std::time::Duration;

use super::{Entry, cue_mut, renumber, split_timing, strip_bom, timecode};
use crate::error::{LipiError, Result};

/// WebVTT document. Cue settings, identifiers and NOTE/STYLE blocks are not kept.
#[derive(Debug, Clone, Default)]
pub struct VttDocument {
    entries: Vec<Entry>,
}

impl VttDocument {
    pub fn parse(content: &str) -> Result<Self> {
        let lines: Vec<&str> = strip_bom(content).lines().collect();

        let header = lines.iter().position(|l| !l.trim().is_empty());
        match header {
            Some(i) if lines[i].trim_start().starts_with("WEBVTT") => {}
            Some(i) => return Err(LipiError::parse(i + 1, "missing WEBVTT header")),
            None => return Ok(Self::default()),
        }

        let mut entries = Vec::new();
        let mut current: Option<(Duration, Duration, Vec<String>)> = None;
        let mut skipping = false;
        let mut block_start = true;

        for (i, raw) in lines.iter().enumerate() {
            let line = raw.trim();

            if line.is_empty() {
                flush(&mut entries, current.take());
                skipping = false;
                block_start = true;
                continue;
            }

            if block_start {
                block_start = false;
                if line.starts_with("WEBVTT")
                    || line.starts_with("NOTE")
                    || line.starts_with("STYLE")
                    || line.starts_with("REGION")
                {
                    skipping = true;
                }
            }
            if skipping {
                continue;
            }

            if line.contains("-->") {
                flush(&mut entries, current.take());
                let (start, end) = parse_timing(line).ok_or_else(|| {
                    LipiError::parse(i + 1, format!("malformed timing line '{}'", line))
                })?;
                current = Some((start, end, Vec::new()));
            } else if let Some((_, _, text)) = current.as_mut() {
                text.push(raw.trim_end().to_string());
            }
            // Anything else is a cue identifier.
        }
        flush(&mut entries, current);

        Ok(Self { entries })
    }

    pub fn from_entries(mut entries: Vec<Entry>) -> Self {
        renumber(&mut entries);
        Self { entries }
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.entries.clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn set_text(&mut self, position: usize, text: &str) -> Result<()> {
        cue_mut(&mut self.entries, position)?.text = text.to_string();
        Ok(())
    }

    pub fn render(&self) -> String {
        let mut out = String::from("WEBVTT\n\n");
        for (i, entry) in self.entries.iter().enumerate() {
            out.push_str(&format!(
                "{}\n{} --> {}\n{}\n\n",
                i + 1,
                timecode::format_vtt(entry.start),
                timecode::format_vtt(entry.end),
                entry.text
            ));
        }
        out
    }
}

fn flush(entries: &mut Vec<Entry>, cue: Option<(Duration, Duration, Vec<String>)>) {
    if let Some((start, end, text)) = cue {
        if !text.is_empty() {
            entries.push(Entry {
                index: entries.len() + 1,
                start,
                end,
                text: text.join("\n"),
            });
        }
    }
}

fn parse_timing(line: &str) -> Option<(Duration, Duration)> {
    let (start, end) = split_timing(line)?;
    Some((timecode::parse_vtt(start)?, timecode::parse_vtt(end)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_header_and_notes() {
        let content = "WEBVTT - Example\nKind: captions\n\nNOTE this is ignored\nstill a note\n\nSTYLE\n::cue { color: red }\n\nintro\n00:01.000 --> 00:04.000 align:start\nHello\n\n00:00:05.000 --> 00:00:06.500\nTwo\nlines\n";
        let doc = VttDocument::parse(content).unwrap();
        let entries = doc.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].start, Duration::from_secs(1));
        assert_eq!(entries[0].text, "Hello");
        assert_eq!(entries[1].end, Duration::from_millis(6_500));
        assert_eq!(entries[1].text, "Two\nlines");
    }

    #[test]
    fn test_timing_line_flushes_previous_cue() {
        let content = "WEBVTT\n\n00:01.000 --> 00:02.000\nFirst\n00:03.000 --> 00:04.000\nSecond\n";
        let doc = VttDocument::parse(content).unwrap();
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.entries()[1].text, "Second");
    }

    #[test]
    fn test_missing_header() {
        assert!(matches!(
            VttDocument::parse("00:01.000 --> 00:02.000\nHi\n"),
            Err(LipiError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_malformed_timing() {
        let content = "WEBVTT\n\n00:01.000 --> soon\nHi\n";
        assert!(matches!(
            VttDocument::parse(content),
            Err(LipiError::Parse { line: 3, .. })
        ));
    }

    #[test]
    fn test_render() {
        let content = "\u{feff}WEBVTT\n\n01:00.000 --> 01:02.250\nHi\n";
        let doc = VttDocument::parse(content).unwrap();
        assert_eq!(doc.render(), "WEBVTT\n\n1\n00:01:00.000 --> 00:01:02.250\nHi\n\n");
    }
}
