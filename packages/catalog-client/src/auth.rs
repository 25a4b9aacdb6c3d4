//! Refresh-token exchange against the catalog accounts service

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use cadence_shared_config::CatalogConfig;
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use crate::client::build_http_client;
use crate::error::{CatalogError, CatalogResult};
use crate::models::{OAuthErrorResponse, TokenGrant};

/// Exchanges refresh tokens for fresh access tokens
#[derive(Clone)]
pub struct TokenRefresher {
    http_client: Client,
    config: CatalogConfig,
}

impl fmt::Debug for TokenRefresher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRefresher")
            .field("token_url", &self.config.token_url())
            .field("client_id", &self.config.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

impl TokenRefresher {
    /// Create a refresher using the configured client credentials
    pub fn new(config: &CatalogConfig) -> CatalogResult<Self> {
        Ok(Self {
            http_client: build_http_client(config)?,
            config: config.clone(),
        })
    }

    /// HTTP client shared with catalog clients created for refreshed tokens
    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    fn basic_credentials(&self) -> String {
        let raw = format!("{}:{}", self.config.client_id, self.config.client_secret);
        format!("Basic {}", STANDARD.encode(raw))
    }

    /// Exchange a refresh token for a new access token
    ///
    /// # Errors
    /// - `CatalogError::InvalidInput` - If the refresh token is empty
    /// - `CatalogError::TokenRefresh` - If the accounts service rejects the grant
    /// - `CatalogError::Http` - If the HTTP request fails
    #[instrument(skip_all)]
    pub async fn refresh(&self, refresh_token: &str) -> CatalogResult<TokenGrant> {
        if refresh_token.trim().is_empty() {
            return Err(CatalogError::InvalidInput(
                "refresh token cannot be empty".to_string(),
            ));
        }

        let response = self
            .http_client
            .post(self.config.token_url())
            .header(reqwest::header::AUTHORIZATION, self.basic_credentials())
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CatalogError::Timeout
                } else {
                    CatalogError::Http(e)
                }
            })?;

        let status = response.status();
        let text = response.text().await?;

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(CatalogError::RateLimited {
                retry_after_secs: None,
            });
        }

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<OAuthErrorResponse>(&text) {
                return Err(CatalogError::TokenRefresh {
                    error: error.error,
                    description: error.error_description.unwrap_or_default(),
                });
            }
            return Err(CatalogError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let grant: TokenGrant = serde_json::from_str(&text)?;
        debug!(
            expires_in = grant.expires_in,
            rotated = grant.refresh_token.is_some(),
            "Refreshed access token"
        );

        Ok(grant)
    }
}
