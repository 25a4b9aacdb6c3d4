//! One playlist run: aggregate, resolve, filter, assemble, publish, describe

use std::time::Duration;

use cadence_catalog_client::MAX_PLAYLIST_WRITE;
use serde::Serialize;
use tracing::{info, instrument};

use crate::catalog::Catalog;
use crate::config::{DEFAULT_AGGREGATOR_CONCURRENCY, DEFAULT_SOURCE_FETCH_TIMEOUT_SECS};
use crate::error::WorkerResult;
use crate::jobs::aggregate::aggregate;
use crate::jobs::assemble::{assemble, publish};
use crate::jobs::attributes::resolve;
use crate::jobs::description::update_description;
use crate::jobs::filter::{FilterChain, TrackContext};
use crate::models::Job;

/// Tunables for a single pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Width of the source-fetch pool
    pub concurrency: usize,
    /// Time budget of one source fetch
    pub source_timeout: Duration,
    /// Tracks per append call
    pub publish_batch_size: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_AGGREGATOR_CONCURRENCY,
            source_timeout: Duration::from_secs(DEFAULT_SOURCE_FETCH_TIMEOUT_SECS),
            publish_batch_size: MAX_PLAYLIST_WRITE,
        }
    }
}

/// What a successful run did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Unique tracks drawn from the recipe
    pub candidates: usize,
    /// Candidates left after the filter chain
    pub survivors: usize,
    /// Tracks written to the target playlist, pinned tail included
    pub published: usize,
    pub description_updated: bool,
}

/// Rebuild and publish the target playlist of `job`
///
/// Source and attribute failures degrade the result without failing the run.
/// A publish failure fails the run before the description is touched.
#[instrument(skip_all, fields(job_id = %job.id, playlist_id = %job.target.id))]
pub async fn process_job(
    catalog: &dyn Catalog,
    job: &Job,
    settings: &PipelineSettings,
) -> WorkerResult<RunSummary> {
    let candidates = aggregate(
        &job.recipe,
        catalog,
        settings.concurrency,
        settings.source_timeout,
    )
    .await;

    let attributes = resolve(&candidates, catalog).await;

    let chain = FilterChain::for_job(job);
    let survivors: Vec<String> = candidates
        .iter()
        .filter(|&track| {
            !chain.is_banned(&TrackContext {
                track,
                genres: attributes.genres_for(track),
                features: attributes.audio_for(track),
            })
        })
        .map(|track| track.id.clone())
        .collect();

    info!(
        candidates = candidates.len(),
        survivors = survivors.len(),
        removed = candidates.len() - survivors.len(),
        "Filtered candidate pool"
    );

    let summary_survivors = survivors.len();
    let tracks = assemble(survivors, &job.last_tracks);
    let published = publish(
        catalog,
        &job.target.id,
        &tracks,
        settings.publish_batch_size,
    )
    .await?;

    let description_updated = update_description(catalog, job).await;

    Ok(RunSummary {
        candidates: candidates.len(),
        survivors: summary_survivors,
        published,
        description_updated,
    })
}
