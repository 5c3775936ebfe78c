// Tolerant extraction of JSON arrays from model output
//
// Model responses wrap the payload in prose, code fences or an outer object,
// and sometimes emit backslash sequences JSON does not allow. `extract` scans
// for the first array that decodes into records carrying real content.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{LipiError, Result};

const EXCERPT_CHARS: usize = 200;

/// A record type that can be recovered from free-form model output
pub trait RecoverableRecord: DeserializeOwned {
    /// Object keys that may hold the array, in priority order
    const WRAPPER_KEYS: &'static [&'static str];

    /// Whether invalid backslash escapes should be doubled before decoding
    const REPAIR_ESCAPES: bool;

    /// True when the record carries real content
    fn is_evidence(&self) -> bool;
}

/// One timed transcript line as returned by a model, times in seconds
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TranscriptRecord {
    #[serde(default)]
    pub start: f64,
    #[serde(default)]
    pub end: f64,
    #[serde(default)]
    pub text: String,
}

impl RecoverableRecord for TranscriptRecord {
    const WRAPPER_KEYS: &'static [&'static str] =
        &["segments", "transcript", "transcription", "results", "data"];
    const REPAIR_ESCAPES: bool = false;

    fn is_evidence(&self) -> bool {
        !self.text.is_empty() || self.start > 0.0 || self.end > 0.0
    }
}

/// Remove markdown code fence markers
pub fn strip_code_fences(text: &str) -> String {
    text.replace("```json", "")
        .replace("```JSON", "")
        .replace("```", "")
        .trim()
        .to_string()
}

/// Double every backslash that does not start a valid JSON escape
pub fn escape_invalid_escapes(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        match chars.peek() {
            Some(&next @ ('"' | '\\' | '/' | 'b' | 'f' | 'n' | 'r' | 't' | 'u')) => {
                out.push('\\');
                out.push(next);
                chars.next();
            }
            _ => out.push_str("\\\\"),
        }
    }

    out
}

/// Find the first JSON array in `text` that decodes into valid records
pub fn extract<R: RecoverableRecord>(text: &str) -> Result<Vec<R>> {
    let mut cleaned = strip_code_fences(text);
    if R::REPAIR_ESCAPES {
        cleaned = escape_invalid_escapes(&cleaned);
    }

    for (pos, c) in cleaned.char_indices() {
        if c != '[' && c != '{' {
            continue;
        }

        let mut stream = serde_json::Deserializer::from_str(&cleaned[pos..]).into_iter::<Value>();
        let value = match stream.next() {
            Some(Ok(value)) => value,
            _ => continue,
        };

        if let Some(records) = accept::<R>(value) {
            debug!("Recovered {} records at offset {}", records.len(), pos);
            return Ok(records);
        }
    }

    Err(LipiError::NoValidJson {
        excerpt: text.trim().chars().take(EXCERPT_CHARS).collect(),
    })
}

fn accept<R: RecoverableRecord>(value: Value) -> Option<Vec<R>> {
    match value {
        Value::Array(_) => validated(value),
        Value::Object(mut map) => {
            for key in R::WRAPPER_KEYS {
                if let Some(inner) = map.remove(*key) {
                    if let Some(records) = validated(inner) {
                        return Some(records);
                    }
                }
            }
            map.into_iter()
                .filter(|(_, v)| v.is_array())
                .find_map(|(_, v)| validated(v))
        }
        _ => None,
    }
}

fn validated<R: RecoverableRecord>(value: Value) -> Option<Vec<R>> {
    if !value.is_array() {
        return None;
    }
    let records: Vec<R> = serde_json::from_value(value).ok()?;
    if records.iter().any(R::is_evidence) {
        Some(records)
    } else {
        None
    }
}
