//! Error types for StoryCheck.
//!
//! Library crates use [`StoryCheckError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Structural ambiguity and routing misses are deliberately absent: both are
//! absorbed by fallbacks and only show up as tracing events and report counters.

use std::path::PathBuf;

/// Top-level error type for all StoryCheck operations.
#[derive(Debug, thiserror::Error)]
pub enum StoryCheckError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A collaborator (document accessor or evaluation service) could not be reached.
    #[error("{collaborator} unavailable: {message}")]
    Unavailable {
        collaborator: &'static str,
        message: String,
    },

    /// The evaluation service answered with something we cannot decode.
    #[error("malformed evaluation response: {message}")]
    MalformedResponse { message: String },

    /// The evaluation service answered with an explicit error payload.
    #[error("evaluation service error: {0}")]
    Service(String),

    /// A single annotation could not be attached to its paragraph.
    #[error("annotation write failed for paragraph {paragraph_index}: {message}")]
    Annotation {
        paragraph_index: usize,
        message: String,
    },

    /// Text parsing error (evaluation text format, document files).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (invalid input document, bad flag value, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, StoryCheckError>;

impl StoryCheckError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create an unavailable-collaborator error.
    pub fn unavailable(collaborator: &'static str, msg: impl Into<String>) -> Self {
        Self::Unavailable {
            collaborator,
            message: msg.into(),
        }
    }

    /// Create a malformed-response error from any displayable message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse {
            message: msg.into(),
        }
    }

    /// Create an annotation write error for one paragraph.
    pub fn annotation(paragraph_index: usize, msg: impl Into<String>) -> Self {
        Self::Annotation {
            paragraph_index,
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether this error aborts a whole check pass.
    ///
    /// Annotation failures are per-paragraph and never abort the pass.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Annotation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = StoryCheckError::config("missing base url");
        assert_eq!(err.to_string(), "config error: missing base url");

        let err = StoryCheckError::unavailable("evaluation service", "connection refused");
        assert_eq!(
            err.to_string(),
            "evaluation service unavailable: connection refused"
        );

        let err = StoryCheckError::annotation(4, "document locked");
        assert!(err.to_string().contains("paragraph 4"));
    }

    #[test]
    fn only_annotation_failures_are_non_fatal() {
        assert!(!StoryCheckError::annotation(0, "locked").is_fatal());
        assert!(StoryCheckError::malformed("missing evaluations").is_fatal());
        assert!(StoryCheckError::Service("boom".into()).is_fatal());
    }
}
