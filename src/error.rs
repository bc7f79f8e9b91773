use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoverageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Coverage file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Invalid coverage file {}: {reason}", .path.display())]
    InvalidCoverageFile { path: PathBuf, reason: String },

    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::Error),

    #[error("Precondition violated: {0}")]
    Precondition(String),

    #[error("Failed to download {url}: {reason}")]
    Download { url: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl CoverageError {
    /// An invalid-format error for in-memory input that has no path yet.
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        CoverageError::InvalidCoverageFile {
            path: PathBuf::new(),
            reason: reason.into(),
        }
    }

    /// Attach a path to an invalid-format error produced while parsing bytes.
    pub(crate) fn with_path(self, path: &std::path::Path) -> Self {
        match self {
            CoverageError::InvalidCoverageFile { reason, .. } => {
                CoverageError::InvalidCoverageFile {
                    path: path.to_path_buf(),
                    reason,
                }
            }
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, CoverageError>;
