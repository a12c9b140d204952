//! Error types for agent-bridge.
//!
//! Library crates use [`BridgeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.
//!
//! Per-unit and per-source problems are normally *not* surfaced as errors:
//! they are downgraded to [`crate::Warning`] values by the caller and the
//! operation continues. The variants below are what reaches that boundary.

use std::path::PathBuf;

/// Top-level error type for all agent-bridge operations.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// A source origin is unreachable or its snapshot is corrupted.
    #[error("fetch error for source '{source_name}': {message}")]
    Fetch {
        source_name: String,
        message: String,
    },

    /// An individual knowledge file could not be read or parsed.
    #[error("malformed unit at {path:?}: {reason}")]
    MalformedUnit { path: PathBuf, reason: String },

    /// Two units with the same key inside one tree.
    #[error("duplicate {kind} unit '{identifier}'")]
    DuplicateUnit { kind: String, identifier: String },

    /// Unknown target identifier, source name, or similar lookup miss.
    #[error("not found: {target}")]
    NotFound { target: String },

    /// Destination unwritable or converter output inconsistent.
    #[error("render error for target '{target}': {message}")]
    Render { target: String, message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (bad name, invalid format, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BridgeError>;

impl BridgeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a fetch error for the named source.
    pub fn fetch(source_name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Fetch {
            source_name: source_name.into(),
            message: msg.into(),
        }
    }

    /// Create a malformed-unit error for a file or bundle directory.
    pub fn malformed(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::MalformedUnit {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create a not-found error.
    pub fn not_found(target: impl Into<String>) -> Self {
        Self::NotFound {
            target: target.into(),
        }
    }

    /// Create a render error for the given target.
    pub fn render(target: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Render {
            target: target.into(),
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

    /// Whether this error indicates a broken invariant rather than bad input.
    pub fn is_defect(&self) -> bool {
        matches!(self, Self::DuplicateUnit { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = BridgeError::config("missing home directory");
        assert_eq!(err.to_string(), "config error: missing home directory");

        let err = BridgeError::fetch("team-vault", "git exited with status 128");
        assert_eq!(
            err.to_string(),
            "fetch error for source 'team-vault': git exited with status 128"
        );

        let err = BridgeError::not_found("emacs");
        assert!(err.to_string().contains("emacs"));
    }

    #[test]
    fn duplicate_unit_is_defect() {
        let err = BridgeError::DuplicateUnit {
            kind: "skill".into(),
            identifier: "clean-code".into(),
        };
        assert!(err.is_defect());
        assert_eq!(err.to_string(), "duplicate skill unit 'clean-code'");
        assert!(!BridgeError::render("cursor", "denied").is_defect());
    }
}
