//! Mock catalog Web API server for testing the catalog client
//!
//! Provides a [`MockCatalogServer`] that simulates the playlist, audio-feature,
//! artist, identity and token endpoints without a real catalog account.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_string_contains, header_exists, method, path, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

/// Mock catalog server for testing catalog client calls
///
/// Both the Web API and the accounts service are served from the same base
/// URL, so a `CatalogConfig::with_url(server.url())` points at everything.
///
/// # Example
///
/// ```rust,ignore
/// use cadence_test_utils::{MockCatalogServer, TrackFixture};
///
/// #[tokio::test]
/// async fn test_playlist_read() {
///     let server = MockCatalogServer::start().await;
///     server
///         .mock_playlist_items("abc", vec![TrackFixture::new("t1", "Song").to_item_json()])
///         .await;
///
///     // Configure your client with server.url()
/// }
/// ```
pub struct MockCatalogServer {
    server: MockServer,
}

impl MockCatalogServer {
    /// Start a new mock catalog server
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Get the server URL
    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Get reference to the underlying mock server for custom mock setups
    pub fn inner(&self) -> &MockServer {
        &self.server
    }

    /// All requests received so far
    pub async fn received_requests(&self) -> Vec<Request> {
        self.server.received_requests().await.unwrap_or_default()
    }

    /// Requests received for a given method and exact path
    pub async fn requests_to(&self, http_method: &str, request_path: &str) -> Vec<Request> {
        self.received_requests()
            .await
            .into_iter()
            .filter(|r| r.method.to_string() == http_method && r.url.path() == request_path)
            .collect()
    }

    /// Mount a single-page playlist
    pub async fn mock_playlist_items(&self, playlist_id: &str, items: Vec<serde_json::Value>) {
        self.mock_playlist_pages(playlist_id, vec![items]).await;
    }

    /// Mount a playlist split across several pages linked by `next`
    pub async fn mock_playlist_pages(&self, playlist_id: &str, pages: Vec<Vec<serde_json::Value>>) {
        let page_count = pages.len();
        for (index, items) in pages.into_iter().enumerate() {
            let next = if index + 1 < page_count {
                json!(format!("{}/pages/{}/{}", self.url(), playlist_id, index + 1))
            } else {
                serde_json::Value::Null
            };
            let page_path = if index == 0 {
                format!("/playlists/{}/tracks", playlist_id)
            } else {
                format!("/pages/{}/{}", playlist_id, index)
            };

            Mock::given(method("GET"))
                .and(path(page_path))
                .and(header_exists("authorization"))
                .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                    "items": items,
                    "next": next
                })))
                .mount(&self.server)
                .await;
        }
    }

    /// Mount a 404 for a playlist
    pub async fn mock_playlist_not_found(&self, playlist_id: &str) {
        Mock::given(method("GET"))
            .and(path(format!("/playlists/{}/tracks", playlist_id)))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "error": { "status": 404, "message": "Resource not found" }
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount the audio-features endpoint (entries may be `null`)
    pub async fn mock_audio_features(&self, features: Vec<serde_json::Value>) {
        Mock::given(method("GET"))
            .and(path("/audio-features"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "audio_features": features
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount the artists endpoint
    pub async fn mock_artists(&self, artists: Vec<ArtistFixture>) {
        let artists_json: Vec<serde_json::Value> = artists.iter().map(|a| a.to_json()).collect();

        Mock::given(method("GET"))
            .and(path("/artists"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "artists": artists_json
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount successful replace (PUT) and add (POST) endpoints for a playlist
    pub async fn mock_playlist_writes(&self, playlist_id: &str) {
        let tracks_path = format!("/playlists/{}/tracks", playlist_id);

        Mock::given(method("PUT"))
            .and(path(tracks_path.clone()))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "snapshot_id": "snap-replace" })),
            )
            .mount(&self.server)
            .await;

        Mock::given(method("POST"))
            .and(path(tracks_path))
            .respond_with(
                ResponseTemplate::new(201).set_body_json(json!({ "snapshot_id": "snap-add" })),
            )
            .mount(&self.server)
            .await;
    }

    /// Mount a successful playlist details update
    pub async fn mock_playlist_details(&self, playlist_id: &str) {
        Mock::given(method("PUT"))
            .and(path(format!("/playlists/{}", playlist_id)))
            .respond_with(ResponseTemplate::new(200))
            .mount(&self.server)
            .await;
    }

    /// Mount the current-user endpoint
    pub async fn mock_current_user(&self, user_id: &str) {
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": user_id,
                "display_name": user_id
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a 401 for the current-user endpoint
    pub async fn mock_current_user_unauthorized(&self) {
        Mock::given(method("GET"))
            .and(path("/me"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "status": 401, "message": "The access token expired" }
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a successful refresh-token exchange
    pub async fn mock_token_refresh(&self, access_token: &str, rotated_refresh: Option<&str>) {
        let mut body = json!({
            "access_token": access_token,
            "token_type": "Bearer",
            "expires_in": 3600,
            "scope": "playlist-modify-private playlist-modify-public"
        });
        if let Some(refresh) = rotated_refresh {
            body["refresh_token"] = json!(refresh);
        }

        Mock::given(method("POST"))
            .and(path("/api/token"))
            .and(header_exists("authorization"))
            .and(body_string_contains("grant_type=refresh_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    /// Mount a rejected refresh-token exchange
    pub async fn mock_token_invalid_grant(&self) {
        Mock::given(method("POST"))
            .and(path("/api/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Refresh token revoked"
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a server error (500) for all Web API GET paths
    pub async fn mock_server_error(&self, error_message: &str) {
        Mock::given(method("GET"))
            .and(path_regex(".*"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({
                "error": { "status": 500, "message": error_message }
            })))
            .mount(&self.server)
            .await;
    }

    /// Mount a rate limit response (429) for all GET paths
    pub async fn mock_rate_limit(&self) {
        self.mock_rate_limit_for("0").await;
    }

    /// Mount a rate limit response (429) for all GET paths with the given `Retry-After`
    pub async fn mock_rate_limit_for(&self, retry_after: &str) {
        Mock::given(method("GET"))
            .and(path_regex(".*"))
            .respond_with(
                ResponseTemplate::new(429)
                    .insert_header("Retry-After", retry_after)
                    .set_body_json(json!({
                        "error": { "status": 429, "message": "API rate limit exceeded" }
                    })),
            )
            .mount(&self.server)
            .await;
    }

    /// Mount an error status for every write (PUT and POST) to a playlist's tracks
    pub async fn mock_playlist_write_error(&self, playlist_id: &str, status: u16) {
        for http_method in ["PUT", "POST"] {
            Mock::given(method(http_method))
                .and(path(format!("/playlists/{}/tracks", playlist_id)))
                .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                    "error": { "status": status, "message": "upstream failure" }
                })))
                .mount(&self.server)
                .await;
        }
    }

    /// Mount an append endpoint that succeeds only after `delay`
    pub async fn mock_slow_playlist_append(&self, playlist_id: &str, delay: Duration) {
        Mock::given(method("POST"))
            .and(path(format!("/playlists/{}/tracks", playlist_id)))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(json!({ "snapshot_id": "snap-add" }))
                    .set_delay(delay),
            )
            .mount(&self.server)
            .await;
    }
}

/// Test fixture for a catalog track embedded in a playlist item
#[derive(Debug, Clone)]
pub struct TrackFixture {
    pub id: Option<String>,
    pub name: String,
    pub artist_id: String,
    pub artist_name: String,
    pub album_id: String,
    pub popularity: Option<u32>,
    pub duration_ms: u64,
}

impl TrackFixture {
    /// Create a track fixture with a generic artist and album
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: Some(id.to_string()),
            name: name.to_string(),
            artist_id: "artist-1".to_string(),
            artist_name: "Artist One".to_string(),
            album_id: "album-1".to_string(),
            popularity: Some(50),
            duration_ms: 200_000,
        }
    }

    /// Create a local-file track (no catalog id)
    pub fn local(name: &str) -> Self {
        Self {
            id: None,
            ..Self::new("unused", name)
        }
    }

    /// Set the primary artist
    pub fn by(mut self, artist_id: &str, artist_name: &str) -> Self {
        self.artist_id = artist_id.to_string();
        self.artist_name = artist_name.to_string();
        self
    }

    /// Set the album
    pub fn on_album(mut self, album_id: &str) -> Self {
        self.album_id = album_id.to_string();
        self
    }

    /// Convert to the JSON track object
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "name": self.name,
            "artists": [{ "id": self.artist_id, "name": self.artist_name }],
            "album": { "id": self.album_id, "name": "Album" },
            "popularity": self.popularity,
            "duration_ms": self.duration_ms
        })
    }

    /// Convert to a playlist item wrapping this track
    pub fn to_item_json(&self) -> serde_json::Value {
        json!({ "track": self.to_json() })
    }
}

/// Playlist item whose track has been removed from the catalog
pub fn null_track_item() -> serde_json::Value {
    json!({ "track": null })
}

/// Audio-features entry on the catalog's 0.0 - 1.0 scale
pub fn audio_features_json(
    id: &str,
    energy: f64,
    danceability: f64,
    acousticness: f64,
    duration_ms: u64,
) -> serde_json::Value {
    json!({
        "id": id,
        "energy": energy,
        "danceability": danceability,
        "acousticness": acousticness,
        "duration_ms": duration_ms
    })
}

/// Test fixture for a full artist object
#[derive(Debug, Clone)]
pub struct ArtistFixture {
    pub id: String,
    pub name: String,
    pub genres: Vec<String>,
}

impl ArtistFixture {
    /// Create an artist fixture with the given genres
    pub fn new(id: &str, name: &str, genres: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            genres: genres.iter().map(|g| g.to_string()).collect(),
        }
    }

    /// Convert to JSON value
    pub fn to_json(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "name": self.name,
            "genres": self.genres
        })
    }
}
