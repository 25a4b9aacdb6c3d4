//! Playlist pipeline stages and the runner that schedules them
//!
//! A run moves through:
//! - Aggregation of random samples from the recipe's source playlists
//! - Attribute resolution (audio features and artist genres)
//! - The filter chain built from the job's bans and bounds
//! - Assembly and chunked publication to the target playlist
//! - A best-effort description refresh

pub mod aggregate;
pub mod assemble;
pub mod attributes;
pub mod description;
pub mod filter;
pub mod pipeline;
pub mod scheduler;

pub use pipeline::{process_job, PipelineSettings, RunSummary};
pub use scheduler::{
    eligibility, reschedule_job, schedule_overview, JobOutcome, JobRunner, PassReport,
    RunnerSettings, ScheduleEntry, SkipReason,
};
