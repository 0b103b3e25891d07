use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Required capability missing: {0}")]
    MissingCapability(String),

    #[error("Merge produced no data rows")]
    EmptyDataset,

    #[error("Browser launch failed: {0}")]
    BrowserLaunchFailed(String),

    #[error("Page error: {0}")]
    PageError(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    IoError(String),

    #[error("Table error: {0}")]
    TableError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl CaptureError {
    /// Fatal errors abort the stage or batch; everything else is a per-row
    /// failure that gets logged and skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            CaptureError::ConfigurationError(_)
                | CaptureError::MissingCapability(_)
                | CaptureError::EmptyDataset
                | CaptureError::BrowserLaunchFailed(_)
        )
    }
}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::IoError(err.to_string())
    }
}

impl From<csv::Error> for CaptureError {
    fn from(err: csv::Error) -> Self {
        CaptureError::TableError(err.to_string())
    }
}

impl From<serde_json::Error> for CaptureError {
    fn from(err: serde_json::Error) -> Self {
        CaptureError::SerializationError(err.to_string())
    }
}
