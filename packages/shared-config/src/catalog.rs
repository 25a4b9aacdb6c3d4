//! Music catalog API configuration types

use url::Url;

use crate::{get_env_or_default, get_required_env, parse_env, ConfigError, ConfigResult};

/// Default catalog Web API base URL
pub const DEFAULT_API_URL: &str = "https://api.spotify.com/v1";

/// Default catalog accounts (token) service base URL
pub const DEFAULT_ACCOUNTS_URL: &str = "https://accounts.spotify.com";

/// Music catalog service configuration
#[derive(Debug, Clone)]
pub struct CatalogConfig {
    /// Web API base URL
    pub api_url: String,

    /// Accounts service base URL (refresh-token exchange)
    pub accounts_url: String,

    /// OAuth client id
    pub client_id: String,

    /// OAuth client secret
    pub client_secret: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Connection timeout in seconds
    pub connect_timeout_secs: u64,
}

impl CatalogConfig {
    /// Load catalog configuration from environment variables
    ///
    /// `CATALOG_CLIENT_ID` and `CATALOG_CLIENT_SECRET` are required because
    /// every scheduled run needs to refresh user credentials.
    pub fn from_env() -> ConfigResult<Self> {
        let client_id = get_required_env("CATALOG_CLIENT_ID")?;
        let client_secret = get_required_env("CATALOG_CLIENT_SECRET")?;

        if client_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "CATALOG_CLIENT_ID".to_string(),
                "client id cannot be empty".to_string(),
            ));
        }

        if client_secret.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "CATALOG_CLIENT_SECRET".to_string(),
                "client secret cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            api_url: validated_url("CATALOG_API_URL", DEFAULT_API_URL)?,
            accounts_url: validated_url("CATALOG_ACCOUNTS_URL", DEFAULT_ACCOUNTS_URL)?,
            client_id,
            client_secret,
            timeout_secs: parse_env("CATALOG_TIMEOUT", 20)?,
            connect_timeout_secs: parse_env("CATALOG_CONNECT_TIMEOUT", 5)?,
        })
    }

    /// Create a configuration pointing both endpoints at one base URL (useful for testing)
    pub fn with_url(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            api_url: url.clone(),
            accounts_url: url,
            client_id: "test-client-id".to_string(),
            client_secret: "test-client-secret".to_string(),
            timeout_secs: 20,
            connect_timeout_secs: 5,
        }
    }

    /// Get the full URL for a Web API path
    pub fn api_endpoint(&self, path: &str) -> String {
        let base = self.api_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/{}", base, path)
    }

    /// Get the full URL for the token endpoint
    pub fn token_url(&self) -> String {
        format!("{}/api/token", self.accounts_url.trim_end_matches('/'))
    }
}

fn validated_url(name: &str, default: &str) -> ConfigResult<String> {
    let value = get_env_or_default(name, default);
    Url::parse(&value).map_err(|e| ConfigError::InvalidUrl(name.to_string(), e.to_string()))?;
    Ok(value)
}
