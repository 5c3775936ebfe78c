use super::{Entry, cue_mut, renumber, split_timing, strip_bom, timecode};
use crate::error::{LipiError, Result};

/// SubRip document. Saved canonically with indices renumbered.
#[derive(Debug, Clone, Default)]
pub struct SrtDocument {
    entries: Vec<Entry>,
}

impl SrtDocument {
    pub fn parse(content: &str) -> Result<Self> {
        let mut entries = Vec::new();
        let mut lines = strip_bom(content).lines().enumerate().peekable();

        while let Some((i, raw)) = lines.next() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }

            // An index line is optional in practice; the timing line is not.
            let (timing_no, timing) = if line.contains("-->") {
                (i + 1, line)
            } else if line.parse::<usize>().is_ok() {
                match lines.next() {
                    Some((j, next)) => (j + 1, next.trim()),
                    None => {
                        return Err(LipiError::parse(i + 1, "subtitle index without timing line"));
                    }
                }
            } else {
                return Err(LipiError::parse(
                    i + 1,
                    format!("expected subtitle index, found '{}'", line),
                ));
            };

            let (start, end) = parse_timing(timing)
                .ok_or_else(|| LipiError::parse(timing_no, format!("malformed timing line '{}'", timing)))?;

            let mut text = Vec::new();
            while let Some((_, next)) = lines.peek() {
                if next.trim().is_empty() {
                    break;
                }
                text.push(next.trim_end().to_string());
                lines.next();
            }

            if !text.is_empty() {
                entries.push(Entry {
                    index: entries.len() + 1,
                    start,
                    end,
                    text: text.join("\n"),
                });
            }
        }

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
        let mut out = String::new();
        for (i, entry) in self.entries.iter().enumerate() {
            out.push_str(&format!(
                "{}\n{} --> {}\n{}\n\n",
                i + 1,
                timecode::format_srt(entry.start),
                timecode::format_srt(entry.end),
                entry.text
            ));
        }
        out
    }
}

fn parse_timing(line: &str) -> Option<(std::time::Duration, std::time::Duration)> {
    let (start, end) = split_timing(line)?;
    Some((timecode::parse_srt(start)?, timecode::parse_srt(end)?))
}
