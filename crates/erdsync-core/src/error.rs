//! Error types

use std::io;
use std::path::{Path, PathBuf};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the sync and inference engine
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    /// E0001: Bound model is not present in the manifest
    #[error("model '{name}' not found in manifest")]
    #[diagnostic(
        code(erdsync::model_not_found),
        help("Re-generate the manifest or check the entity's dbt_model binding")
    )]
    ModelNotFound { name: String },

    /// E0002: An expected file does not exist
    #[error("file not found: {}", path.display())]
    #[diagnostic(code(erdsync::file_not_found))]
    FileNotFound { path: PathBuf },

    /// E0003: Input rejected before any write
    #[error("{message}")]
    #[diagnostic(code(erdsync::validation))]
    Validation { message: String },

    /// E0004: YAML that cannot be read back as a schema document
    #[error("invalid YAML{}: line {line}: {message}", path.as_ref().map(|p| format!(" in {}", p.display())).unwrap_or_default())]
    #[diagnostic(code(erdsync::parse))]
    Parse {
        path: Option<PathBuf>,
        line: usize,
        message: String,
    },

    /// E0005: I/O failure while reading or writing a file
    #[error("failed to {action} {}", path.display())]
    #[diagnostic(code(erdsync::file_operation))]
    FileOperation {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// E0006: Missing or unusable project configuration
    #[error("{message}")]
    #[diagnostic(code(erdsync::configuration))]
    Configuration { message: String },
}

/// Coarse classification used by callers to map errors to responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    FileOperation,
    Configuration,
}

impl Error {
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }

    pub fn file_operation(action: &'static str, path: impl AsRef<Path>, source: io::Error) -> Self {
        Error::FileOperation {
            action,
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Attach a file path to a parse error
    pub fn with_path(self, file: impl AsRef<Path>) -> Self {
        match self {
            Error::Parse { line, message, .. } => Error::Parse {
                path: Some(file.as_ref().to_path_buf()),
                line,
                message,
            },
            other => other,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ModelNotFound { .. } | Error::FileNotFound { .. } => ErrorKind::NotFound,
            Error::Validation { .. } | Error::Parse { .. } => ErrorKind::Validation,
            Error::FileOperation { .. } => ErrorKind::FileOperation,
            Error::Configuration { .. } => ErrorKind::Configuration,
        }
    }

    /// Get the error code string (e.g., "E0001")
    pub fn code(&self) -> &'static str {
        match self {
            Error::ModelNotFound { .. } => "E0001",
            Error::FileNotFound { .. } => "E0002",
            Error::Validation { .. } => "E0003",
            Error::Parse { .. } => "E0004",
            Error::FileOperation { .. } => "E0005",
            Error::Configuration { .. } => "E0006",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        let err = Error::ModelNotFound {
            name: "orders".to_string(),
        };
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.code(), "E0001");

        let err = Error::file_operation(
            "write",
            "models/orders.yml",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.kind(), ErrorKind::FileOperation);
        assert_eq!(err.to_string(), "failed to write models/orders.yml");
    }

    #[test]
    fn test_parse_error_with_path() {
        let err = Error::Parse {
            path: None,
            line: 3,
            message: "unexpected indentation".to_string(),
        }
        .with_path("models/schema.yml");
        assert_eq!(
            err.to_string(),
            "invalid YAML in models/schema.yml: line 3: unexpected indentation"
        );
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
