use std::{fmt, path::PathBuf};

#[derive(Debug)]
pub enum EngineError {
    /// `FANSTREAM_CONFIG` pointed at a file that does not exist.
    ConfigNotFound { path: PathBuf },
    /// I/O error reading a file.
    Io { path: PathBuf, source: std::io::Error },
    /// JSON parse error for a file.
    Json { path: PathBuf, source: serde_json::Error },

    /// JSON-to-typed deserialization error (when the JSON is already parsed).
    JsonValue { path: PathBuf, source: serde_json::Error },

    /// Config is syntactically valid but semantically invalid.
    InvalidConfig { path: PathBuf, msg: String },

    /// The drawing backend failed while rendering a frame.
    Render(String),

    /// PNG encode/decode failure.
    Codec(String),

    /// The HTTP client could not be constructed.
    Http(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::ConfigNotFound { path } => {
                write!(f, "Config file {} does not exist", path.display())
            }
            EngineError::Io { path, source } => {
                write!(f, "I/O error for {}: {}", path.display(), source)
            }
            EngineError::Json { path, source } => {
                write!(f, "JSON parse error for {}: {}", path.display(), source)
            }
            EngineError::JsonValue { path, source } => {
                write!(f, "JSON deserialize error for {}: {}", path.display(), source)
            }
            EngineError::InvalidConfig { path, msg } => {
                write!(f, "Invalid config {}: {}", path.display(), msg)
            }
            EngineError::Render(msg) => write!(f, "Render error: {msg}"),
            EngineError::Codec(msg) => write!(f, "Image codec error: {msg}"),
            EngineError::Http(msg) => write!(f, "HTTP client error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Io { source, .. } => Some(source),
            EngineError::Json { source, .. } => Some(source),
            EngineError::JsonValue { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<image::ImageError> for EngineError {
    fn from(err: image::ImageError) -> Self {
        EngineError::Codec(err.to_string())
    }
}
