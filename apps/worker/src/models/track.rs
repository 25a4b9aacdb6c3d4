//! Tracks flowing through the pipeline

use cadence_catalog_client::{AudioFeatures, PlaylistItem, Track};
use serde::{Deserialize, Serialize};

/// A sampled track, reduced to the fields the filter chain reads
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateTrack {
    pub id: String,
    pub name: String,
    /// Primary (first listed) artist
    pub artist_id: Option<String>,
    pub artist_name: String,
    pub album_id: Option<String>,
    pub popularity: Option<u32>,
    pub duration_ms: Option<u64>,
}

impl CandidateTrack {
    /// Convert a playlist item, dropping null tracks and tracks without an id
    pub fn from_item(item: PlaylistItem) -> Option<Self> {
        item.track.and_then(Self::from_track)
    }

    pub fn from_track(track: Track) -> Option<Self> {
        let id = track.id.filter(|id| !id.is_empty())?;
        let primary = track.artists.into_iter().next();
        let (artist_id, artist_name) = match primary {
            Some(artist) => (artist.id, artist.name),
            None => (None, String::new()),
        };

        Some(Self {
            id,
            name: track.name,
            artist_id,
            artist_name,
            album_id: track.album.and_then(|album| album.id),
            popularity: track.popularity,
            duration_ms: track.duration_ms,
        })
    }
}

/// Numeric attributes checked by range bans
///
/// Fractional audio features are scaled to 0-100. Duration comes from the
/// audio features, popularity from the track itself.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackAttributes {
    pub energy: Option<f64>,
    pub danceability: Option<f64>,
    pub acousticness: Option<f64>,
    pub duration_ms: Option<u64>,
    pub popularity: Option<u32>,
}

impl TrackAttributes {
    pub fn collect(track: &CandidateTrack, features: Option<&AudioFeatures>) -> Self {
        let scaled = |value: Option<f64>| value.map(|v| v * 100.0);
        Self {
            energy: features.and_then(|f| scaled(f.energy)),
            danceability: features.and_then(|f| scaled(f.danceability)),
            acousticness: features.and_then(|f| scaled(f.acousticness)),
            duration_ms: features.and_then(|f| f.duration_ms),
            popularity: track.popularity,
        }
    }
}
