use geoprop_core::ValidationError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    /// Network failure or timeout talking to the index.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The index answered with a non-success status.
    #[error("search index returned {status}: {message}")]
    Index { status: u16, message: String },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// An asynchronous index task finished unsuccessfully or never finished.
    #[error("index task {uid} failed: {message}")]
    Task { uid: u64, message: String },

    #[error("search index misconfigured: {0}")]
    Misconfiguration(String),
}

impl SearchError {
    /// Everything except caller input and configuration is an upstream problem.
    #[must_use]
    pub fn is_upstream(&self) -> bool {
        !matches!(
            self,
            SearchError::Validation(_) | SearchError::Misconfiguration(_)
        )
    }
}
