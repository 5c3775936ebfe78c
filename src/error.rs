use thiserror::Error;

#[derive(Error, Debug)]
pub enum LipiError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("No subtitle entries in {0}")]
    EmptyDocument(String),

    #[error("Index {index} out of range (document has {len} entries)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("No valid JSON found in response: {excerpt}")]
    NoValidJson { excerpt: String },

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Expected {expected} results, got {actual}")]
    ResultCountMismatch { expected: usize, actual: usize },

    #[error("{kind} {index} failed: {source}")]
    UnitFailed {
        kind: &'static str,
        index: usize,
        #[source]
        source: Box<LipiError>,
    },

    #[error("Pipeline error: {0}")]
    Pipeline(String),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {0}")]
    FileNotFound(String),
}

impl LipiError {
    /// Build a parse error for a 1-based line number
    pub fn parse<S: Into<String>>(line: usize, message: S) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LipiError>;
