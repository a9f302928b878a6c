//! Error types for the demand preparation pipeline

use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed embedding table
    #[error("Embedding format error at line {line}: {message}")]
    Format { line: usize, message: String },

    /// Normalizer used before fitting, or fitted twice
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Zero-width normalization range
    #[error("Degenerate normalization range: {0}")]
    DegenerateRange(String),

    /// Declared split lengths exceed the available time steps
    #[error("Split overflow: segments before the last need {required} time steps, only {available} available")]
    SplitOverflow { required: usize, available: usize },

    /// Invalid windowing parameters or incompatible array shapes
    #[error("Shape error: {0}")]
    Shape(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to read a .npy array
    #[error("Failed to read npy array: {0}")]
    NpyRead(#[from] ndarray_npy::ReadNpyError),

    /// Failed to write a .npy array
    #[error("Failed to write npy array: {0}")]
    NpyWrite(#[from] ndarray_npy::WriteNpyError),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl Error {
    pub(crate) fn format(line: usize, message: impl Into<String>) -> Self {
        Error::Format {
            line,
            message: message.into(),
        }
    }

    /// Short name of the error kind, used by the CLI when reporting failures
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Format { .. } => "FormatError",
            Error::InvalidState(_) => "InvalidStateError",
            Error::DegenerateRange(_) => "DegenerateRangeError",
            Error::SplitOverflow { .. } => "SplitOverflowError",
            Error::Shape(_) => "ShapeError",
            Error::Config(_) => "ConfigError",
            Error::Io(_) => "IoError",
            Error::NpyRead(_) | Error::NpyWrite(_) => "NpyError",
            Error::Json(_) | Error::Toml(_) | Error::TomlSer(_) => "SerializationError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_names() {
        assert_eq!(Error::format(3, "bad").kind(), "FormatError");
        assert_eq!(
            Error::SplitOverflow {
                required: 10,
                available: 5
            }
            .kind(),
            "SplitOverflowError"
        );
        assert_eq!(Error::Shape("x".into()).kind(), "ShapeError");
    }

    #[test]
    fn test_error_display_names_location() {
        let err = Error::format(7, "expected 4 tokens, found 2");
        assert_eq!(
            err.to_string(),
            "Embedding format error at line 7: expected 4 tokens, found 2"
        );
    }
}
