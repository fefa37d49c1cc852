//! Error types shared across the audit pipeline.
//!
//! Only [`AuditError::ConfigError`] is allowed to abort a run. Every other
//! variant is absorbed at the component that produced it (fetcher, license
//! filter, exporter) and surfaces in the run summary instead.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type AuditResult<T> = Result<T, AuditError>;

#[derive(Debug, Error)]
pub enum AuditError {
    /// Invalid policy or configuration. Raised before any network call.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// Transport-level failure (connect, timeout, TLS, body decode).
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The remote service answered with a non-success status.
    #[error("server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    /// The report artifact could not be created or written.
    #[error("export error: {0}")]
    ExportError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
}

impl AuditError {
    /// True when the error came from a 404 response.
    pub fn is_not_found(&self) -> bool {
        matches!(self, AuditError::ServerError { status: 404, .. })
    }
}
