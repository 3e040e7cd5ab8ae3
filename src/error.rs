//! Error types for fetching, rendering and delivering exports.

use thiserror::Error;

/// Result type used across the export pipeline.
pub type Result<T> = std::result::Result<T, ExportError>;

#[derive(Error, Debug)]
pub enum ExportError {
    /// Transport-level failure talking to the REST backend.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The backend answered with a non-2xx status.
    #[error("{url} returned {status}")]
    Status { url: String, status: u16 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("document error: {0}")]
    Document(String),

    #[error("translation failed: {0}")]
    Translation(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// A script-specific export was requested without a font that covers it.
    #[error("no font configured for {script} text (set tamil_font_path or MOI_TAMIL_FONT)")]
    MissingFont { script: &'static str },

    /// An entry the backend would reject, caught before sending.
    #[error("invalid entry: {0}")]
    InvalidEntry(String),

    #[error("not logged in")]
    Unauthenticated,

    #[error("{0} not found")]
    NotFound(String),
}

impl From<toml::de::Error> for ExportError {
    fn from(e: toml::de::Error) -> Self {
        ExportError::Config(e.to_string())
    }
}
