//! Error types for morphogen_io crate.
//!
//! Provides structured error handling for genome parsing, encodings,
//! genome files and archetype manifests.

use morphogen_core::CoreError;
use thiserror::Error;

/// Main error type for morphogen_io operations.
#[derive(Error, Debug)]
pub enum IoError {
    /// Malformed genome text. No partial genome is ever returned.
    #[error("Parse error at line {line} in <{tag}>: {fragment}")]
    Parse {
        tag: String,
        fragment: String,
        line: usize,
    },

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// File system errors
    #[error("File system error: {0}")]
    FileSystem(#[from] std::io::Error),

    /// JSON parsing errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Not found errors
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Simulation errors surfaced while loading
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Generic error with context
    #[error("{context}: {source}")]
    Context {
        context: String,
        source: Box<IoError>,
    },
}

/// Result type alias for morphogen_io operations.
pub type Result<T> = std::result::Result<T, IoError>;

impl IoError {
    /// Creates a parse error pointing at `tag` on `line`.
    #[must_use]
    pub fn parse<T: Into<String>, F: Into<String>>(tag: T, fragment: F, line: usize) -> Self {
        Self::Parse {
            tag: tag.into(),
            fragment: fragment.into(),
            line,
        }
    }

    /// Creates a new serialization error.
    #[must_use]
    pub fn serialization<S: Into<String>>(msg: S) -> Self {
        Self::Serialization(msg.into())
    }

    /// Creates a new validation error.
    #[must_use]
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a new not found error.
    #[must_use]
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        Self::NotFound(resource.into())
    }

    /// Wraps an error with additional context.
    #[must_use]
    pub fn with_context<S: Into<String>>(self, context: S) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IoError::serialization("test error");
        assert_eq!(err.to_string(), "Serialization error: test error");
    }

    #[test]
    fn test_parse_error_names_tag_and_line() {
        let err = IoError::parse("orientation", "1,0,x", 7);
        let text = err.to_string();
        assert!(text.contains("<orientation>"));
        assert!(text.contains("line 7"));
        assert!(text.contains("1,0,x"));
    }

    #[test]
    fn test_error_context() {
        let err = IoError::not_found("swimmer.genome").with_context("loading genome");
        assert!(err.to_string().contains("loading genome"));
    }

    #[test]
    fn test_from_core_error() {
        let err: IoError = CoreError::InvalidTypeName("::".into()).into();
        assert!(matches!(err, IoError::Core(_)));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: IoError = io_err.into();
        assert!(matches!(err, IoError::FileSystem(_)));
    }
}
