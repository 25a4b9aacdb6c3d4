//! Cadence worker library
//!
//! Rebuilds user playlists from recipes of source playlists, filters them
//! through per-job bans and attribute bounds, and publishes the result on an
//! hourly schedule. The binary performs one scheduled pass per invocation.

pub mod catalog;
pub mod config;
pub mod error;
pub mod jobs;
pub mod models;
pub mod store;

pub use catalog::{Catalog, CatalogConnector, HttpCatalogConnector};
pub use config::{Config, SchedulerConfig};
pub use error::{ErrorSeverity, WorkerError, WorkerResult};
pub use jobs::{JobOutcome, JobRunner, PassReport, RunSummary, RunnerSettings, SkipReason};
pub use store::{JobStore, PgJobStore};
