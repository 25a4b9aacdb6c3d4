//! Catalog Web API client implementation

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::time::Duration;

use cadence_shared_config::CatalogConfig;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::error::{CatalogError, CatalogResult};
use crate::models::{
    track_uri, Artist, ArtistsResponse, AudioFeatures, AudioFeaturesResponse, CurrentUser,
    DetailsBody, ErrorResponse, Paging, PlaylistItem, UrisBody,
};

/// Maximum ids per audio-features request
pub const MAX_AUDIO_FEATURE_IDS: usize = 100;

/// Maximum ids per artists request
pub const MAX_ARTIST_IDS: usize = 50;

/// Maximum track URIs per playlist replace/add request
pub const MAX_PLAYLIST_WRITE: usize = 100;

/// Page size used when reading playlist items
const PLAYLIST_PAGE_LIMIT: u32 = 100;

/// Upper bound on followed `next` links (10,000 items per playlist is the catalog cap)
const MAX_PLAYLIST_PAGES: usize = 100;

/// Maximum error body size kept in error messages
const MAX_ERROR_BODY_SIZE: usize = 500;

/// Default number of retry attempts for transient failures
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Base delay for exponential backoff (milliseconds)
const RETRY_BASE_DELAY_MS: u64 = 200;

/// Longest server-requested wait honoured before giving up (milliseconds)
pub const MAX_RETRY_DELAY_MS: u64 = 30_000;

/// Catalog Web API client bound to one user's access token
#[derive(Clone)]
pub struct CatalogClient {
    http_client: Client,
    config: CatalogConfig,
    access_token: String,
    max_retries: u32,
    retry_base_delay_ms: u64,
}

impl fmt::Debug for CatalogClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogClient")
            .field("api_url", &self.config.api_url)
            .field("access_token", &"[REDACTED]")
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

/// Build the shared HTTP client with the configured timeouts
pub(crate) fn build_http_client(config: &CatalogConfig) -> CatalogResult<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
        .pool_max_idle_per_host(10)
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent("Cadence/1.0")
        .build()?)
}

impl CatalogClient {
    /// Create a new catalog client for the given access token
    ///
    /// # Errors
    /// Returns `CatalogError::MissingAccessToken` if the token is empty
    pub fn new(config: &CatalogConfig, access_token: impl Into<String>) -> CatalogResult<Self> {
        let http_client = build_http_client(config)?;
        Self::with_client(config, http_client, access_token)
    }

    /// Create a client around an existing HTTP client (shares its connection pool)
    pub fn with_client(
        config: &CatalogConfig,
        http_client: Client,
        access_token: impl Into<String>,
    ) -> CatalogResult<Self> {
        let access_token = access_token.into();
        if access_token.trim().is_empty() {
            return Err(CatalogError::MissingAccessToken);
        }

        Ok(Self {
            http_client,
            config: config.clone(),
            access_token,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: RETRY_BASE_DELAY_MS,
        })
    }

    /// Set retry configuration
    pub fn with_retry_config(mut self, max_retries: u32, base_delay_ms: u64) -> Self {
        self.max_retries = max_retries;
        self.retry_base_delay_ms = base_delay_ms;
        self
    }

    /// Validate a playlist id before it is placed in a URL path
    fn validate_playlist_id(playlist_id: &str) -> CatalogResult<&str> {
        let trimmed = playlist_id.trim();
        if trimmed.is_empty() {
            return Err(CatalogError::InvalidInput(
                "playlist id cannot be empty".to_string(),
            ));
        }
        if !trimmed.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(CatalogError::InvalidInput(format!(
                "playlist id must be alphanumeric: {}",
                trimmed
            )));
        }
        Ok(trimmed)
    }

    /// Validate a batch of ids against a per-request limit
    fn validate_batch(ids: &[String], limit: usize, what: &str) -> CatalogResult<()> {
        if ids.len() > limit {
            return Err(CatalogError::InvalidInput(format!(
                "too many {} ids in one request: {} (max {})",
                what,
                ids.len(),
                limit
            )));
        }
        Ok(())
    }

    /// Execute an operation with retry logic for transient failures
    async fn with_retry<T, F, Fut>(&self, operation: F) -> CatalogResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = CatalogResult<T>>,
    {
        self.retry_when(CatalogError::is_retryable, operation).await
    }

    /// Execute an operation, retrying only errors accepted by `should_retry`
    ///
    /// A rate limit whose `Retry-After` exceeds [`MAX_RETRY_DELAY_MS`] is
    /// returned instead of waited out.
    async fn retry_when<T, F, Fut>(
        &self,
        should_retry: fn(&CatalogError) -> bool,
        operation: F,
    ) -> CatalogResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = CatalogResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if should_retry(&e) && attempt < self.max_retries => {
                    let delay_ms = match &e {
                        CatalogError::RateLimited {
                            retry_after_secs: Some(secs),
                        } => secs.saturating_mul(1000),
                        _ => self
                            .retry_base_delay_ms
                            .saturating_mul(2u64.saturating_pow(attempt + 1)),
                    };
                    if delay_ms > MAX_RETRY_DELAY_MS {
                        warn!(delay_ms, error = %e, "Retry delay too long, giving up");
                        return Err(e);
                    }

                    attempt += 1;
                    warn!(
                        attempt = attempt,
                        max_retries = self.max_retries,
                        delay_ms = delay_ms,
                        error = %e,
                        "Catalog request failed, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Send a request and translate error statuses
    async fn send(&self, request: RequestBuilder) -> CatalogResult<Response> {
        let response = request
            .bearer_auth(&self.access_token)
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
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            warn!(?retry_after_secs, "Catalog API rate limited");
            return Err(CatalogError::RateLimited { retry_after_secs });
        }

        let body = response.text().await.unwrap_or_default();
        let message = match serde_json::from_str::<ErrorResponse>(&body) {
            Ok(parsed) => parsed.error.message,
            Err(_) => body.chars().take(MAX_ERROR_BODY_SIZE).collect(),
        };

        Err(match status {
            StatusCode::UNAUTHORIZED => CatalogError::Unauthorized(message),
            StatusCode::NOT_FOUND => CatalogError::NotFound(message),
            _ => CatalogError::Api {
                status: status.as_u16(),
                message,
            },
        })
    }

    /// Send a GET request and decode the JSON body
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> CatalogResult<T> {
        let text = self
            .with_retry(|| async {
                let response = self
                    .send(self.http_client.get(url).query(query))
                    .await?;
                response.text().await.map_err(CatalogError::Http)
            })
            .await?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Fetch every item of a playlist, following pagination
    ///
    /// Items whose inner track is null are returned as-is; callers decide
    /// what to do with them.
    #[instrument(skip(self))]
    pub async fn playlist_items(&self, playlist_id: &str) -> CatalogResult<Vec<PlaylistItem>> {
        let playlist_id = Self::validate_playlist_id(playlist_id)?;
        let first_url = self
            .config
            .api_endpoint(&format!("playlists/{}/tracks", playlist_id));

        let mut page: Paging<PlaylistItem> = self
            .get_json(&first_url, &[("limit", PLAYLIST_PAGE_LIMIT.to_string())])
            .await?;
        let mut items = std::mem::take(&mut page.items);
        let mut pages = 1;

        while let Some(next) = page.next.take() {
            if pages >= MAX_PLAYLIST_PAGES {
                warn!(playlist_id, pages, "Stopping playlist pagination at page cap");
                break;
            }
            page = self.get_json(&next, &[]).await?;
            items.append(&mut page.items);
            pages += 1;
        }

        debug!(playlist_id, item_count = items.len(), pages, "Fetched playlist items");

        Ok(items)
    }

    /// Fetch audio features for up to 100 tracks
    ///
    /// Ids the catalog has no analysis for are left out of the returned map.
    #[instrument(skip(self, track_ids), fields(count = track_ids.len()))]
    pub async fn audio_features(
        &self,
        track_ids: &[String],
    ) -> CatalogResult<HashMap<String, AudioFeatures>> {
        Self::validate_batch(track_ids, MAX_AUDIO_FEATURE_IDS, "track")?;
        if track_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let url = self.config.api_endpoint("audio-features");
        let response: AudioFeaturesResponse = self
            .get_json(&url, &[("ids", track_ids.join(","))])
            .await?;

        let features: HashMap<String, AudioFeatures> = response
            .audio_features
            .into_iter()
            .flatten()
            .map(|f| (f.id.clone(), f))
            .collect();

        debug!(
            requested = track_ids.len(),
            returned = features.len(),
            "Fetched audio features"
        );

        Ok(features)
    }

    /// Fetch full artist objects for up to 50 artists
    #[instrument(skip(self, artist_ids), fields(count = artist_ids.len()))]
    pub async fn artists(&self, artist_ids: &[String]) -> CatalogResult<Vec<Artist>> {
        Self::validate_batch(artist_ids, MAX_ARTIST_IDS, "artist")?;
        if artist_ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.config.api_endpoint("artists");
        let response: ArtistsResponse = self
            .get_json(&url, &[("ids", artist_ids.join(","))])
            .await?;

        Ok(response.artists.into_iter().flatten().collect())
    }

    /// Replace the whole contents of a playlist (at most 100 tracks)
    #[instrument(skip(self, track_ids), fields(count = track_ids.len()))]
    pub async fn replace_playlist_tracks(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> CatalogResult<()> {
        self.write_playlist_tracks(playlist_id, track_ids, true).await
    }

    /// Append tracks to the end of a playlist (at most 100 tracks)
    #[instrument(skip(self, track_ids), fields(count = track_ids.len()))]
    pub async fn add_playlist_tracks(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> CatalogResult<()> {
        self.write_playlist_tracks(playlist_id, track_ids, false).await
    }

    async fn write_playlist_tracks(
        &self,
        playlist_id: &str,
        track_ids: &[String],
        replace: bool,
    ) -> CatalogResult<()> {
        let playlist_id = Self::validate_playlist_id(playlist_id)?;
        Self::validate_batch(track_ids, MAX_PLAYLIST_WRITE, "track")?;

        let url = self
            .config
            .api_endpoint(&format!("playlists/{}/tracks", playlist_id));
        let body = UrisBody {
            uris: track_ids.iter().map(|id| track_uri(id)).collect(),
        };

        // Appends are not idempotent: only resend when the catalog never applied the request
        let should_retry: fn(&CatalogError) -> bool = if replace {
            CatalogError::is_retryable
        } else {
            CatalogError::was_rejected_unapplied
        };

        self.retry_when(should_retry, || async {
            let request = if replace {
                self.http_client.put(&url)
            } else {
                self.http_client.post(&url)
            };
            self.send(request.json(&body)).await.map(|_| ())
        })
        .await
    }

    /// Change a playlist's description
    #[instrument(skip(self, description))]
    pub async fn change_playlist_description(
        &self,
        playlist_id: &str,
        description: &str,
    ) -> CatalogResult<()> {
        let playlist_id = Self::validate_playlist_id(playlist_id)?;
        let url = self.config.api_endpoint(&format!("playlists/{}", playlist_id));
        let body = DetailsBody { description };

        self.with_retry(|| async {
            self.send(self.http_client.put(&url).json(&body))
                .await
                .map(|_| ())
        })
        .await
    }

    /// Get the user that owns the access token
    #[instrument(skip(self))]
    pub async fn current_user(&self) -> CatalogResult<CurrentUser> {
        let url = self.config.api_endpoint("me");
        self.get_json(&url, &[]).await
    }
}
