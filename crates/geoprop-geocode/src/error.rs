use geoprop_core::ValidationError;
use thiserror::Error;

/// Errors returned by geocoding providers and the geocode service.
///
/// "No match" is never an error: lookups return `Ok(None)` for that.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// Missing or rejected credentials. Operators must fix configuration;
    /// retrying will not help.
    #[error("geocoding misconfigured: {0}")]
    Misconfiguration(String),

    /// The provider answered but reported a failure.
    #[error("{provider} upstream error: {message}")]
    Upstream {
        provider: &'static str,
        message: String,
        retriable: bool,
    },

    /// Network or TLS failure, or a non-2xx status surfaced by `reqwest`.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl GeocodeError {
    /// Transient failures worth another attempt after a back-off.
    #[must_use]
    pub fn is_retriable(&self) -> bool {
        match self {
            GeocodeError::Http(e) => {
                e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
            }
            GeocodeError::Upstream { retriable, .. } => *retriable,
            GeocodeError::Misconfiguration(_)
            | GeocodeError::Deserialize { .. }
            | GeocodeError::Validation(_) => false,
        }
    }

    #[must_use]
    pub fn is_misconfiguration(&self) -> bool {
        matches!(self, GeocodeError::Misconfiguration(_))
    }
}
