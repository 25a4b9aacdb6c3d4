//! Catalog API error types

use thiserror::Error;

/// Catalog API client errors
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Access token is missing
    #[error("an access token is required for catalog API access")]
    MissingAccessToken,

    /// Invalid input provided to API method
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed
    #[error("Failed to parse catalog response: {0}")]
    Parse(#[from] serde_json::Error),

    /// Catalog API returned an error status
    #[error("Catalog API error {status}: {message}")]
    Api { status: u16, message: String },

    /// Requested resource does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Access token rejected or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Token endpoint rejected the refresh request
    #[error("Token refresh rejected ({error}): {description}")]
    TokenRefresh { error: String, description: String },

    /// Rate limited by the catalog
    #[error("Rate limited by catalog API (retry after {retry_after_secs:?}s)")]
    RateLimited { retry_after_secs: Option<u64> },

    /// Request timeout
    #[error("Request to catalog API timed out")]
    Timeout,
}

impl CatalogError {
    /// Check if this error is retryable (transient failure)
    ///
    /// Retries on timeouts, rate limiting, transport errors and 5xx
    /// responses. Client errors (4xx except 429) are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            CatalogError::Timeout | CatalogError::RateLimited { .. } => true,
            CatalogError::Api { status, .. } => *status >= 500,
            CatalogError::Http(e) => {
                if e.is_timeout() || e.is_connect() {
                    return true;
                }
                matches!(e.status(), Some(status) if status.is_server_error())
            }
            _ => false,
        }
    }

    /// Check if the request provably never took effect on the catalog
    ///
    /// True for rate limiting and failed connections. Timeouts and 5xx
    /// responses may follow a write the catalog already applied.
    pub fn was_rejected_unapplied(&self) -> bool {
        match self {
            CatalogError::RateLimited { .. } => true,
            CatalogError::Http(e) => e.is_connect(),
            _ => false,
        }
    }

    /// Check if this error means the credentials are unusable
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            CatalogError::Unauthorized(_)
                | CatalogError::TokenRefresh { .. }
                | CatalogError::MissingAccessToken
        )
    }
}

/// Result type for catalog operations
pub type CatalogResult<T> = Result<T, CatalogError>;
