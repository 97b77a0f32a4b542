use boothdb_core::GeocodeProviderKind;
use thiserror::Error;

/// Errors returned by geocoding provider clients.
///
/// The cascade never surfaces these to its callers; a failing tier is
/// logged and the next tier is tried.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// Network or TLS failure, or a non-2xx status. URLs are stripped from
    /// the inner error so API keys never reach the logs.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 429, or the provider's own quota status.
    #[error("{provider} rate limit exceeded")]
    RateLimited { provider: GeocodeProviderKind },

    /// The provider answered with an application-level error status.
    #[error("{provider} returned an error: {message}")]
    Provider {
        provider: GeocodeProviderKind,
        message: String,
    },

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },
}
