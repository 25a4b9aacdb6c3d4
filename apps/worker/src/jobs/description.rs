//! Playlist description refresh
//!
//! Each published playlist gets a new description: a random fact from the
//! bundled list followed by the job's own description.

use rand::seq::SliceRandom;
use tracing::info;

use crate::catalog::Catalog;
use crate::error::WorkerError;
use crate::models::Job;

const FACTS: &str = include_str!("../../data/facts.txt");

/// Longest description the catalog accepts
pub const MAX_DESCRIPTION_CHARS: usize = 300;

/// Bundled facts with their list numbering removed
pub fn facts() -> Vec<&'static str> {
    FACTS.lines().map(strip_numbering).filter(|f| !f.is_empty()).collect()
}

fn strip_numbering(line: &str) -> &str {
    let line = line.trim();
    let digits = line.bytes().take_while(u8::is_ascii_digit).count();
    if (1..=3).contains(&digits) && line[digits..].starts_with('.') {
        line[digits + 1..].trim()
    } else {
        line
    }
}

/// Description text for the next publish of a job
pub fn compose_description(job_description: &str) -> String {
    let fact = facts()
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or_default();
    let text = format!("{}... {}", fact, job_description.trim());
    truncate_chars(text.trim_end(), MAX_DESCRIPTION_CHARS)
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => text[..cut].to_string(),
        None => text.to_string(),
    }
}

/// Best-effort description update; failures are logged and reported as `false`
pub async fn update_description(catalog: &dyn Catalog, job: &Job) -> bool {
    let text = compose_description(&job.description);
    match catalog
        .update_playlist_description(&job.target.id, &text)
        .await
    {
        Ok(()) => {
            info!(job_id = %job.id, playlist_id = %job.target.id, "Updated playlist description");
            true
        }
        Err(e) => {
            WorkerError::description_update(&job.target.id, e).log();
            false
        }
    }
}
