use thiserror::Error;

use crate::models::LineField;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Line {} is missing a valid {}", index + 1, field.as_str())]
    LineValidation { index: usize, field: LineField },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown status: {0}")]
    UnknownStatus(String),

    #[error("Vendor not found: {0}")]
    VendorNotFound(String),

    #[error("No receiving location available")]
    NoLocationAvailable,

    #[error("Purchase order not found: {0}")]
    PurchaseOrderNotFound(String),

    #[error("Staged line not found: {0}")]
    LineNotFound(i64),

    #[error("Heartland API {status}: {body}")]
    ExternalApi { status: u16, body: String },

    #[error("Heartland API timed out: {0}")]
    ExternalTimeout(String),

    #[error("Missing location header in {0} response")]
    MissingLocationHeader(String),

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

impl BridgeError {
    /// Whether a caller may reasonably try the same call again.
    /// Nothing inside the pipeline retries on its own.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::ExternalTimeout(_) => true,
            Self::ExternalApi { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
