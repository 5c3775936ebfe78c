use std::time::Duration;

use super::{Entry, Segment};

/// Layout limits for generated subtitles
#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub max_chars_per_line: usize,
    pub max_lines: usize,
    pub max_duration: Duration,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            max_chars_per_line: 42,
            max_lines: 2,
            max_duration: Duration::from_secs(7),
        }
    }
}

/// Turns transcript segments into display-ready entries
#[derive(Debug, Clone, Default)]
pub struct SubtitleGenerator {
    settings: GeneratorSettings,
}

impl SubtitleGenerator {
    pub fn new(settings: GeneratorSettings) -> Self {
        Self { settings }
    }

    pub fn generate(&self, segments: &[Segment]) -> Vec<Entry> {
        let mut entries = Vec::new();

        for segment in segments {
            let text = segment.text.trim();
            if text.is_empty() {
                continue;
            }

            let duration = segment.end.saturating_sub(segment.start);
            if self.needs_split(text, duration) {
                for (start, end, piece) in self.split(segment.start, segment.end, text) {
                    entries.push(Entry {
                        index: entries.len() + 1,
                        start,
                        end,
                        text: self.wrap(&piece),
                    });
                }
            } else {
                entries.push(Entry {
                    index: entries.len() + 1,
                    start: segment.start,
                    end: segment.end,
                    text: self.wrap(text),
                });
            }
        }

        entries
    }

    fn max_chars(&self) -> usize {
        (self.settings.max_chars_per_line * self.settings.max_lines).max(1)
    }

    fn needs_split(&self, text: &str, duration: Duration) -> bool {
        text.chars().count() > self.max_chars() || duration > self.settings.max_duration
    }

    /// Spread words evenly over enough pieces to satisfy both limits
    fn split(&self, start: Duration, end: Duration, text: &str) -> Vec<(Duration, Duration, String)> {
        let words: Vec<&str> = text.split_whitespace().collect();
        if words.is_empty() {
            return Vec::new();
        }

        let total = end.saturating_sub(start);
        let by_chars = text.chars().count().div_ceil(self.max_chars()).max(1);
        let by_duration = if self.settings.max_duration.is_zero() {
            1
        } else {
            (total.as_millis() / self.settings.max_duration.as_millis()) as usize + 1
        };
        let pieces = by_chars.max(by_duration);

        let words_per_piece = words.len().div_ceil(pieces);
        let step = total / pieces as u32;

        let mut result = Vec::new();
        let mut cursor = start;
        for (i, group) in words.chunks(words_per_piece).enumerate() {
            let last = (i + 1) * words_per_piece >= words.len();
            let piece_end = if last { end } else { cursor + step };
            result.push((cursor, piece_end, group.join(" ")));
            cursor = piece_end;
        }
        result
    }

    /// Break into two lines at the word boundary nearest the middle
    fn wrap(&self, text: &str) -> String {
        let text = text.trim();
        let length = text.chars().count();
        if length <= self.settings.max_chars_per_line {
            return text.to_string();
        }

        let words: Vec<&str> = text.split_whitespace().collect();
        if words.len() < 2 {
            return text.to_string();
        }

        let middle = length / 2;
        let mut best_split = 0;
        let mut best_diff = usize::MAX;
        let mut running = 0;
        for (i, word) in words[..words.len() - 1].iter().enumerate() {
            running += word.chars().count();
            if i > 0 {
                running += 1;
            }
            let diff = running.abs_diff(middle);
            if diff < best_diff {
                best_diff = diff;
                best_split = i + 1;
            }
        }

        format!("{}\n{}", words[..best_split].join(" "), words[best_split..].join(" "))
    }
}
