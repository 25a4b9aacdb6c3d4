//! Attribute resolution
//!
//! Looks up audio features per track and genres per primary artist in
//! batches sized to the catalog limits. A failed batch only costs the data
//! for its own ids.

use std::collections::{HashMap, HashSet};

use cadence_catalog_client::{AudioFeatures, MAX_ARTIST_IDS, MAX_AUDIO_FEATURE_IDS};
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::WorkerError;
use crate::models::CandidateTrack;

/// Audio features keyed by track id and genre sets keyed by artist id
#[derive(Debug, Clone, Default)]
pub struct ResolvedAttributes {
    pub audio: HashMap<String, AudioFeatures>,
    pub genres: HashMap<String, HashSet<String>>,
    /// Number of batch calls that failed and were treated as "no data"
    pub failed_batches: usize,
}

impl ResolvedAttributes {
    pub fn audio_for(&self, track: &CandidateTrack) -> Option<&AudioFeatures> {
        self.audio.get(&track.id)
    }

    pub fn genres_for(&self, track: &CandidateTrack) -> Option<&HashSet<String>> {
        track
            .artist_id
            .as_ref()
            .and_then(|artist_id| self.genres.get(artist_id))
    }
}

/// Resolve audio features and primary-artist genres for `tracks`
pub async fn resolve(tracks: &[CandidateTrack], catalog: &dyn Catalog) -> ResolvedAttributes {
    let mut resolved = ResolvedAttributes::default();

    let track_ids: Vec<String> = tracks.iter().map(|t| t.id.clone()).collect();
    for batch in track_ids.chunks(MAX_AUDIO_FEATURE_IDS) {
        match catalog.fetch_audio_attributes(batch).await {
            Ok(features) => resolved.audio.extend(features),
            Err(e) => {
                resolved.failed_batches += 1;
                lookup_failed(batch.len(), e);
            }
        }
    }

    let artist_ids = unique_artist_ids(tracks);
    for batch in artist_ids.chunks(MAX_ARTIST_IDS) {
        match catalog.fetch_artist_genres(batch).await {
            Ok(genres) => resolved.genres.extend(genres),
            Err(e) => {
                resolved.failed_batches += 1;
                lookup_failed(batch.len(), e);
            }
        }
    }

    debug!(
        tracks = tracks.len(),
        with_features = resolved.audio.len(),
        artists = artist_ids.len(),
        with_genres = resolved.genres.len(),
        failed_batches = resolved.failed_batches,
        "Resolved track attributes"
    );

    resolved
}

fn lookup_failed(batch_size: usize, reason: impl ToString) {
    WorkerError::AttributeLookup {
        batch_size,
        reason: reason.to_string(),
    }
    .log();
}

/// Distinct primary artist ids in first-seen order
fn unique_artist_ids(tracks: &[CandidateTrack]) -> Vec<String> {
    let mut seen = HashSet::new();
    tracks
        .iter()
        .filter_map(|t| t.artist_id.as_ref())
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}
