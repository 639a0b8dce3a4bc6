use thiserror::Error;

/// Errors raised by the scrape pipeline itself.
#[derive(Debug, Error)]
pub enum ScoutError {
    /// Bad run parameters or missing credentials; raised before any network activity
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A posting lacked one of its required sub-elements, so the page cannot be trusted
    #[error("page {page}: posting #{posting} has no {field} element")]
    ExtractionMismatch {
        page: u32,
        posting: usize,
        field: &'static str,
    },

    /// A CSS selector failed to compile
    #[error("invalid selector `{selector}`: {reason}")]
    Selector { selector: String, reason: String },
}

impl ScoutError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }
}

/// Errors from the local table and the remote store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("remote store returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
