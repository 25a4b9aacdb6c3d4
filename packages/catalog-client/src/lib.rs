//! Music catalog Web API client for Cadence
//!
//! This crate wraps the catalog endpoints the playlist engine needs:
//! - Reading playlist contents (paginated)
//! - Batched audio-feature and artist lookups
//! - Replacing, appending to and describing playlists
//! - Resolving the current user and refreshing access tokens
//!
//! # Example
//!
//! ```rust,no_run
//! use cadence_catalog_client::{CatalogClient, TokenRefresher};
//! use cadence_shared_config::CatalogConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CatalogConfig::from_env()?;
//! let grant = TokenRefresher::new(&config)?.refresh("stored-refresh-token").await?;
//! let client = CatalogClient::new(&config, grant.access_token)?;
//!
//! let me = client.current_user().await?;
//! let items = client.playlist_items("37i9dQZF1DXcBWIGoYBM5M").await?;
//! println!("{} sees {} items", me.id, items.len());
//! # Ok(())
//! # }
//! ```

mod auth;
mod client;
mod error;
mod models;

pub use auth::TokenRefresher;
pub use client::{
    CatalogClient, MAX_ARTIST_IDS, MAX_AUDIO_FEATURE_IDS, MAX_PLAYLIST_WRITE, MAX_RETRY_DELAY_MS,
};
pub use error::{CatalogError, CatalogResult};
pub use models::{
    track_uri, AlbumRef, Artist, ArtistRef, AudioFeatures, CurrentUser, PlaylistItem, TokenGrant,
    Track, TRACK_URI_PREFIX,
};
