//! Track aggregation
//!
//! Draws a random sample from every eligible recipe line and merges the
//! draws into one candidate pool. Sources are fetched concurrently through a
//! bounded, order-preserving stream so that deduplication keeps the first
//! occurrence in recipe order.

use std::collections::HashSet;
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::error::WorkerError;
use crate::models::{CandidateTrack, Recipe, RecipeLine};

/// Build the candidate pool for `recipe`
///
/// A source that fails or exceeds `fetch_timeout` contributes no tracks.
pub async fn aggregate(
    recipe: &Recipe,
    catalog: &dyn Catalog,
    concurrency: usize,
    fetch_timeout: Duration,
) -> Vec<CandidateTrack> {
    let draws: Vec<Vec<CandidateTrack>> = stream::iter(recipe.eligible_lines())
        .map(|line| sample_line(catalog, line, fetch_timeout))
        .buffered(concurrency.max(1))
        .collect()
        .await;

    let drawn: usize = draws.iter().map(Vec::len).sum();
    let pool = dedupe_by_id(draws.into_iter().flatten());

    info!(
        sources = recipe.eligible_lines().count(),
        drawn,
        unique = pool.len(),
        "Aggregated candidate pool"
    );

    pool
}

async fn sample_line(
    catalog: &dyn Catalog,
    line: &RecipeLine,
    fetch_timeout: Duration,
) -> Vec<CandidateTrack> {
    let Some(quantity) = line.sample_size() else {
        return Vec::new();
    };
    let playlist_id = line.source.id.as_str();

    let items = match tokio::time::timeout(fetch_timeout, catalog.fetch_playlist_tracks(playlist_id))
        .await
    {
        Ok(Ok(items)) => items,
        Ok(Err(e)) => {
            WorkerError::source_fetch(playlist_id, e).log();
            return Vec::new();
        }
        Err(_) => {
            WorkerError::source_fetch(
                playlist_id,
                WorkerError::Timeout {
                    seconds: fetch_timeout.as_secs(),
                },
            )
            .log();
            return Vec::new();
        }
    };

    let usable: Vec<CandidateTrack> = items
        .into_iter()
        .filter_map(CandidateTrack::from_item)
        .collect();
    let available = usable.len();
    let sample = draw_sample(usable, quantity);

    debug!(
        playlist_id,
        source = %line.source.name,
        requested = quantity,
        available,
        drawn = sample.len(),
        "Sampled source playlist"
    );

    sample
}

/// Simple random sample without replacement of `min(quantity, items.len())` items
pub fn draw_sample<T>(mut items: Vec<T>, quantity: usize) -> Vec<T> {
    let mut rng = rand::thread_rng();
    items.shuffle(&mut rng);
    items.truncate(quantity);
    items
}

/// Keep the first track for every id
pub fn dedupe_by_id(tracks: impl IntoIterator<Item = CandidateTrack>) -> Vec<CandidateTrack> {
    let mut seen = HashSet::new();
    tracks
        .into_iter()
        .filter(|track| seen.insert(track.id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(id: &str, name: &str) -> CandidateTrack {
        CandidateTrack {
            id: id.to_string(),
            name: name.to_string(),
            artist_id: None,
            artist_name: String::new(),
            album_id: None,
            popularity: None,
            duration_ms: None,
        }
    }

    #[test]
    fn test_draw_sample_size() {
        let items: Vec<u32> = (0..10).collect();
        assert_eq!(draw_sample(items.clone(), 3).len(), 3);
        assert_eq!(draw_sample(items.clone(), 10).len(), 10);
        assert_eq!(draw_sample(items, 25).len(), 10);
        assert!(draw_sample(Vec::<u32>::new(), 5).is_empty());
    }

    #[test]
    fn test_draw_sample_has_no_repeats() {
        let items: Vec<u32> = (0..50).collect();
        let mut sample = draw_sample(items, 20);
        sample.sort_unstable();
        sample.dedup();
        assert_eq!(sample.len(), 20);
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let pool = dedupe_by_id(vec![
            track("a", "first"),
            track("b", "b"),
            track("a", "second"),
        ]);

        assert_eq!(pool.len(), 2);
        assert_eq!(pool[0].name, "first");
        assert_eq!(pool[1].id, "b");
    }
}
