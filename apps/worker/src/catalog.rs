//! Catalog capabilities consumed by the pipeline
//!
//! The pipeline only talks to the [`Catalog`] and [`CatalogConnector`]
//! traits. [`HttpCatalogConnector`] backs them with the Web API client; tests
//! substitute scripted implementations.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use cadence_catalog_client::{
    AudioFeatures, CatalogClient, CatalogResult, PlaylistItem, TokenRefresher,
};
use cadence_shared_config::CatalogConfig;
use chrono::{DateTime, Utc};
use tracing::debug;

use crate::models::Token;

/// Catalog operations available once a user's credentials are usable
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Every item of a playlist, following pagination
    async fn fetch_playlist_tracks(&self, playlist_id: &str) -> CatalogResult<Vec<PlaylistItem>>;

    /// Audio features for at most 100 tracks; unknown ids are absent
    async fn fetch_audio_attributes(
        &self,
        track_ids: &[String],
    ) -> CatalogResult<HashMap<String, AudioFeatures>>;

    /// Genre sets for at most 50 artists
    async fn fetch_artist_genres(
        &self,
        artist_ids: &[String],
    ) -> CatalogResult<HashMap<String, HashSet<String>>>;

    async fn replace_playlist_contents(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> CatalogResult<()>;

    /// Append at most 100 tracks
    async fn append_playlist_contents(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> CatalogResult<()>;

    async fn update_playlist_description(&self, playlist_id: &str, text: &str)
        -> CatalogResult<()>;

    /// Catalog user id the credentials belong to
    async fn current_identity(&self) -> CatalogResult<String>;
}

/// Turns stored tokens into live catalog sessions
#[async_trait]
pub trait CatalogConnector: Send + Sync {
    /// Return `token` unchanged while it is valid, otherwise a refreshed copy
    async fn refresh_credentials_if_expired(
        &self,
        token: &Token,
        now: DateTime<Utc>,
    ) -> CatalogResult<Token>;

    fn connect(&self, token: &Token) -> CatalogResult<Arc<dyn Catalog>>;
}

#[async_trait]
impl Catalog for CatalogClient {
    async fn fetch_playlist_tracks(&self, playlist_id: &str) -> CatalogResult<Vec<PlaylistItem>> {
        self.playlist_items(playlist_id).await
    }

    async fn fetch_audio_attributes(
        &self,
        track_ids: &[String],
    ) -> CatalogResult<HashMap<String, AudioFeatures>> {
        self.audio_features(track_ids).await
    }

    async fn fetch_artist_genres(
        &self,
        artist_ids: &[String],
    ) -> CatalogResult<HashMap<String, HashSet<String>>> {
        let artists = self.artists(artist_ids).await?;
        Ok(artists
            .into_iter()
            .map(|artist| (artist.id, artist.genres.into_iter().collect()))
            .collect())
    }

    async fn replace_playlist_contents(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> CatalogResult<()> {
        self.replace_playlist_tracks(playlist_id, track_ids).await
    }

    async fn append_playlist_contents(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> CatalogResult<()> {
        self.add_playlist_tracks(playlist_id, track_ids).await
    }

    async fn update_playlist_description(
        &self,
        playlist_id: &str,
        text: &str,
    ) -> CatalogResult<()> {
        self.change_playlist_description(playlist_id, text).await
    }

    async fn current_identity(&self) -> CatalogResult<String> {
        Ok(self.current_user().await?.id)
    }
}

/// Connector backed by the catalog Web API
#[derive(Debug, Clone)]
pub struct HttpCatalogConnector {
    config: CatalogConfig,
    refresher: TokenRefresher,
}

impl HttpCatalogConnector {
    pub fn new(config: &CatalogConfig) -> CatalogResult<Self> {
        Ok(Self {
            config: config.clone(),
            refresher: TokenRefresher::new(config)?,
        })
    }
}

#[async_trait]
impl CatalogConnector for HttpCatalogConnector {
    async fn refresh_credentials_if_expired(
        &self,
        token: &Token,
        now: DateTime<Utc>,
    ) -> CatalogResult<Token> {
        if !token.is_expired(now) {
            return Ok(token.clone());
        }

        debug!(user_id = %token.user_id, "Access token expired, refreshing");
        let grant = self.refresher.refresh(&token.refresh_token).await?;
        Ok(token.refreshed(grant, now))
    }

    fn connect(&self, token: &Token) -> CatalogResult<Arc<dyn Catalog>> {
        let client = CatalogClient::with_client(
            &self.config,
            self.refresher.http_client().clone(),
            token.access_token.clone(),
        )?;
        Ok(Arc::new(client))
    }
}
