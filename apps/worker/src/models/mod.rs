//! Domain records handled by the worker

mod job;
mod token;
mod track;

pub use job::{
    AttributeBounds, Bounds, BoundViolation, Freshness, Job, PlaylistRef, Recipe, RecipeLine,
};
pub use token::{Token, EXPIRY_LEEWAY_SECS};
pub use track::{CandidateTrack, TrackAttributes};
