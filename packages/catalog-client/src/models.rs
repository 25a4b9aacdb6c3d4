//! Catalog API response models

use serde::{Deserialize, Serialize};

/// Prefix for catalog track URIs
pub const TRACK_URI_PREFIX: &str = "spotify:track:";

/// Build a track URI from a bare track id
pub fn track_uri(track_id: &str) -> String {
    format!("{}{}", TRACK_URI_PREFIX, track_id)
}

/// One entry of a playlist. The inner track is null for removed or
/// unavailable items.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistItem {
    #[serde(default)]
    pub track: Option<Track>,
}

/// A catalog track as embedded in playlist items
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Track id (null for local files)
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub artists: Vec<ArtistRef>,
    #[serde(default)]
    pub album: Option<AlbumRef>,
    /// Popularity (0 - 100)
    #[serde(default)]
    pub popularity: Option<u32>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

/// Simplified artist reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtistRef {
    pub id: Option<String>,
    pub name: String,
}

/// Simplified album reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlbumRef {
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Audio analysis attributes for a track
///
/// Fractional attributes are on the catalog's native 0.0 - 1.0 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    pub id: String,
    #[serde(default)]
    pub energy: Option<f64>,
    #[serde(default)]
    pub danceability: Option<f64>,
    #[serde(default)]
    pub acousticness: Option<f64>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
}

/// Full artist object (only the fields the engine reads)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artist {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub genres: Vec<String>,
}

/// The user the access token belongs to
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentUser {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Result of a refresh-token exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime of the access token in seconds
    pub expires_in: u64,
    /// Present only when the provider rotates the refresh token
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

// Internal response types for deserialization

#[derive(Debug, Deserialize)]
pub(crate) struct Paging<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub next: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AudioFeaturesResponse {
    pub audio_features: Vec<Option<AudioFeatures>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ArtistsResponse {
    pub artists: Vec<Option<Artist>>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UrisBody {
    pub uris: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct DetailsBody<'a> {
    pub description: &'a str,
}

/// Web API error envelope: `{"error": {"status": 404, "message": "..."}}`
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: ErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    #[allow(dead_code)] // Required for serde deserialization, the HTTP status is authoritative
    pub status: Option<u16>,
    pub message: String,
}

/// Accounts service error: `{"error": "invalid_grant", "error_description": "..."}`
#[derive(Debug, Deserialize)]
pub(crate) struct OAuthErrorResponse {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}
