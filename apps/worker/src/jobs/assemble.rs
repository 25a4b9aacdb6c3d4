//! Output assembly and publication

use cadence_catalog_client::MAX_PLAYLIST_WRITE;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::error::{WorkerError, WorkerResult};

/// Shuffle the survivors and append the pinned tail unchanged
pub fn assemble(mut survivors: Vec<String>, pinned_tail: &[String]) -> Vec<String> {
    survivors.shuffle(&mut rand::thread_rng());
    survivors.extend_from_slice(pinned_tail);
    survivors
}

/// Overwrite the playlist with `track_ids`
///
/// The playlist is cleared first, then filled in consecutive chunks of at
/// most `batch_size` tracks. Returns the number of tracks published.
pub async fn publish(
    catalog: &dyn Catalog,
    playlist_id: &str,
    track_ids: &[String],
    batch_size: usize,
) -> WorkerResult<usize> {
    let batch_size = batch_size.clamp(1, MAX_PLAYLIST_WRITE);

    catalog
        .replace_playlist_contents(playlist_id, &[])
        .await
        .map_err(|e| WorkerError::publish(playlist_id, e))?;

    for (index, chunk) in track_ids.chunks(batch_size).enumerate() {
        catalog
            .append_playlist_contents(playlist_id, chunk)
            .await
            .map_err(|e| WorkerError::publish(playlist_id, format!("batch {}: {}", index, e)))?;
        debug!(playlist_id, batch = index, size = chunk.len(), "Appended batch");
    }

    info!(playlist_id, tracks = track_ids.len(), "Published playlist");
    Ok(track_ids.len())
}
