//! Worker configuration loaded from environment variables
//!
//! The worker layers its own scheduling and pipeline knobs on top of the
//! shared `CommonConfig`. Every knob has a default suited to an hourly cron
//! invocation.

use std::time::Duration;

use anyhow::{Context, Result};
use cadence_catalog_client::MAX_PLAYLIST_WRITE;
use cadence_shared_config::{
    parse_env, CatalogConfig, CommonConfig, ConfigResult, DatabaseConfig, Environment,
};

use crate::jobs::{PipelineSettings, RunnerSettings};

/// Default age after which an unedited job stops being auto-run
pub const DEFAULT_FREEZE_DAYS: i64 = 21;

/// Default width of the source-fetch pool
pub const DEFAULT_AGGREGATOR_CONCURRENCY: usize = 10;

/// Default per-source fetch timeout in seconds
pub const DEFAULT_SOURCE_FETCH_TIMEOUT_SECS: u64 = 30;

/// Worker configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Common configuration shared with other services
    pub common: CommonConfig,

    /// Scheduling and pipeline settings
    pub scheduler: SchedulerConfig,
}

/// Scheduling and pipeline settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Days without a user edit before a job is frozen
    pub freeze_days: i64,

    /// Maximum number of source playlists fetched at once
    pub aggregator_concurrency: usize,

    /// Time budget for a single source fetch, in seconds
    pub source_fetch_timeout_secs: u64,

    /// Tracks per append call when publishing
    pub publish_batch_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            freeze_days: DEFAULT_FREEZE_DAYS,
            aggregator_concurrency: DEFAULT_AGGREGATOR_CONCURRENCY,
            source_fetch_timeout_secs: DEFAULT_SOURCE_FETCH_TIMEOUT_SECS,
            publish_batch_size: MAX_PLAYLIST_WRITE,
        }
    }
}

impl SchedulerConfig {
    /// Load scheduler settings from environment variables
    pub fn from_env() -> ConfigResult<Self> {
        let defaults = Self::default();
        let publish_batch_size: usize =
            parse_env("PUBLISH_BATCH_SIZE", defaults.publish_batch_size)?;

        Ok(Self {
            freeze_days: parse_env("SCHEDULER_FREEZE_DAYS", defaults.freeze_days)?.max(0),
            aggregator_concurrency: parse_env(
                "AGGREGATOR_CONCURRENCY",
                defaults.aggregator_concurrency,
            )?
            .max(1),
            source_fetch_timeout_secs: parse_env(
                "SOURCE_FETCH_TIMEOUT",
                defaults.source_fetch_timeout_secs,
            )?
            .max(1),
            publish_batch_size: publish_batch_size.clamp(1, MAX_PLAYLIST_WRITE),
        })
    }

    /// Settings for a single pipeline run
    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            concurrency: self.aggregator_concurrency,
            source_timeout: Duration::from_secs(self.source_fetch_timeout_secs),
            publish_batch_size: self.publish_batch_size,
        }
    }

    /// Settings for the scheduled runner
    pub fn runner_settings(&self) -> RunnerSettings {
        RunnerSettings {
            freeze_after: chrono::Duration::days(self.freeze_days),
            pipeline: self.pipeline_settings(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let common = CommonConfig::from_env().context("Failed to load common config")?;
        let scheduler = SchedulerConfig::from_env().context("Failed to load scheduler config")?;

        Ok(Self { common, scheduler })
    }

    /// Get database configuration
    pub fn database(&self) -> &DatabaseConfig {
        &self.common.database
    }

    /// Get catalog configuration
    pub fn catalog(&self) -> &CatalogConfig {
        &self.common.catalog
    }

    /// Get environment mode
    pub fn environment(&self) -> Environment {
        self.common.environment
    }
}
