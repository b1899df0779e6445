//! Error types shared by every Textcast crate.

use std::path::PathBuf;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, CampaignError>;

/// Everything that can go wrong while preparing or running a campaign.
///
/// Only the fatal kinds (`Gateway`, `AuthFailed`, `Http`, and I/O while
/// checkpointing) are allowed to escape the dispatch loop. Rows with missing
/// required fields and per-message rejections never become errors; they are
/// logged and skipped where they occur.
#[derive(Debug, thiserror::Error)]
pub enum CampaignError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// An input file is structurally unusable, e.g. a required column is absent.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl CampaignError {
    /// Map an I/O error on `path`, turning `NotFound` into the dedicated variant
    /// so callers can decide between "empty" and "abort".
    pub fn from_io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound(path.into())
        } else {
            Self::Io(err)
        }
    }

    /// Same as [`CampaignError::from_io`] for errors raised by the CSV reader.
    pub fn from_csv(path: impl Into<PathBuf>, err: csv::Error) -> Self {
        if let csv::ErrorKind::Io(io) = err.kind() {
            if io.kind() == std::io::ErrorKind::NotFound {
                return Self::NotFound(path.into());
            }
        }
        Self::Csv(err)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
