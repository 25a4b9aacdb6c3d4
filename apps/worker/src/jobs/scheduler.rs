//! Scheduled and on-demand job execution
//!
//! A scheduled pass walks every stored job once. Jobs that are due at the
//! current UTC hour and were edited recently get fresh credentials and a full
//! pipeline run; every other job is skipped with a reason. One job failing
//! never stops the pass: each job ends up with exactly one [`JobOutcome`].

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::catalog::{Catalog, CatalogConnector};
use crate::config::DEFAULT_FREEZE_DAYS;
use crate::error::{WorkerError, WorkerResult};
use crate::jobs::pipeline::{process_job, PipelineSettings, RunSummary};
use crate::models::{Freshness, Job};
use crate::store::{InvalidJob, JobStore};

/// Tunables for the runner
#[derive(Debug, Clone, PartialEq)]
pub struct RunnerSettings {
    /// Jobs not edited for longer than this are frozen
    pub freeze_after: Duration,
    pub pipeline: PipelineSettings,
}

impl Default for RunnerSettings {
    fn default() -> Self {
        Self {
            freeze_after: Duration::days(DEFAULT_FREEZE_DAYS),
            pipeline: PipelineSettings::default(),
        }
    }
}

/// Why a job was not run in a scheduled pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Unscheduled,
    NotDue,
    Frozen,
    ClockSkew,
}

/// Result of one job in a scheduled pass
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Skipped {
        reason: SkipReason,
    },
    Succeeded {
        tracks: usize,
        description_updated: bool,
        duration_ms: u64,
    },
    Failed {
        error: String,
        retryable: bool,
        duration_ms: u64,
    },
}

impl JobOutcome {
    fn success(summary: &RunSummary, duration_ms: u64) -> Self {
        Self::Succeeded {
            tracks: summary.published,
            description_updated: summary.description_updated,
            duration_ms,
        }
    }

    fn from_error(err: &WorkerError, duration_ms: u64) -> Self {
        Self::Failed {
            error: err.to_string(),
            retryable: err.is_retryable(),
            duration_ms,
        }
    }

    fn undecodable(invalid: &InvalidJob) -> Self {
        Self::Failed {
            error: invalid.reason.clone(),
            retryable: false,
            duration_ms: 0,
        }
    }
}

/// Outcomes of a scheduled pass keyed by job id
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub started_at: DateTime<Utc>,
    pub outcomes: BTreeMap<Uuid, JobOutcome>,
}

impl PassReport {
    fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            outcomes: BTreeMap::new(),
        }
    }

    pub fn outcome(&self, job_id: Uuid) -> Option<&JobOutcome> {
        self.outcomes.get(&job_id)
    }

    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Succeeded { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Skipped { .. }))
    }

    fn count(&self, predicate: impl Fn(&JobOutcome) -> bool) -> usize {
        self.outcomes.values().filter(|o| predicate(o)).count()
    }
}

/// One row of the schedule overview
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScheduleEntry {
    pub job_id: Uuid,
    pub name: String,
    pub scheduled_time: Option<u8>,
    pub last_autorun: Option<DateTime<Utc>>,
    pub frozen: bool,
}

/// Decide whether a job runs in the pass at `now`
pub fn eligibility(job: &Job, now: DateTime<Utc>, freeze_after: Duration) -> Result<(), SkipReason> {
    if job.scheduled_time.is_none() {
        return Err(SkipReason::Unscheduled);
    }
    if !job.is_due(now) {
        return Err(SkipReason::NotDue);
    }
    match job.freshness(now, freeze_after) {
        Freshness::Fresh => Ok(()),
        Freshness::NeverEdited | Freshness::Stale { .. } => Err(SkipReason::Frozen),
        Freshness::FromFuture => Err(SkipReason::ClockSkew),
    }
}

/// Every job with its schedule and frozen state, ordered by hour
pub async fn schedule_overview(
    store: &dyn JobStore,
    now: DateTime<Utc>,
    freeze_after: Duration,
) -> WorkerResult<Vec<ScheduleEntry>> {
    let mut entries: Vec<ScheduleEntry> = store
        .list_jobs()
        .await?
        .into_iter()
        .filter_map(|entry| {
            entry
                .map_err(|invalid| {
                    warn!(job_id = %invalid.job_id, reason = %invalid.reason, "Omitting undecodable job");
                })
                .ok()
        })
        .map(|job| ScheduleEntry {
            frozen: job.is_frozen(now, freeze_after),
            job_id: job.id,
            name: job.target.name,
            scheduled_time: job.scheduled_time,
            last_autorun: job.last_autorun,
        })
        .collect();

    entries.sort_by_key(|entry| (entry.scheduled_time.is_none(), entry.scheduled_time));
    Ok(entries)
}

/// Change a job's auto-run hour as a user edit
///
/// The edit refreshes `last_updated`, so a frozen job becomes eligible again.
/// Duplicate recipe sources are dropped before saving.
pub async fn reschedule_job(
    store: &dyn JobStore,
    job_id: Uuid,
    hour: Option<u8>,
    now: DateTime<Utc>,
) -> WorkerResult<Job> {
    let mut job = store
        .get_job(job_id)
        .await?
        .ok_or(WorkerError::JobNotFound(job_id))?;

    job.set_schedule(hour)?;
    job.record_edit(now);
    let removed = job.recipe.dedup_sources();
    if removed > 0 {
        debug!(%job_id, removed, "Dropped duplicate recipe sources");
    }

    store.save_job(&job).await?;
    info!(%job_id, scheduled_time = ?hour, "Rescheduled job");

    Ok(job)
}

/// Runs jobs against the store and catalog
pub struct JobRunner {
    store: Arc<dyn JobStore>,
    connector: Arc<dyn CatalogConnector>,
    settings: RunnerSettings,
}

impl JobRunner {
    pub fn new(
        store: Arc<dyn JobStore>,
        connector: Arc<dyn CatalogConnector>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            store,
            connector,
            settings,
        }
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Run every job due at `now`
    ///
    /// Only a failure to list jobs is returned as an error; per-job failures,
    /// undecodable rows included, are recorded in the report.
    #[instrument(skip(self))]
    pub async fn run_scheduled_pass(&self, now: DateTime<Utc>) -> WorkerResult<PassReport> {
        let jobs = self.store.list_jobs().await?;
        let mut report = PassReport::new(now);

        info!(jobs = jobs.len(), "Starting scheduled pass");

        for entry in jobs {
            let job = match entry {
                Ok(job) => job,
                Err(invalid) => {
                    error!(job_id = %invalid.job_id, reason = %invalid.reason, "Stored job is undecodable");
                    report
                        .outcomes
                        .insert(invalid.job_id, JobOutcome::undecodable(&invalid));
                    continue;
                }
            };

            let outcome = match eligibility(&job, now, self.settings.freeze_after) {
                Err(reason) => {
                    debug!(job_id = %job.id, ?reason, "Skipping job");
                    JobOutcome::Skipped { reason }
                }
                Ok(()) => self.run_scheduled(&job, now).await,
            };
            report.outcomes.insert(job.id, outcome);
        }

        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped(),
            "Scheduled pass completed"
        );

        Ok(report)
    }

    async fn run_scheduled(&self, job: &Job, now: DateTime<Utc>) -> JobOutcome {
        let started = Instant::now();
        info!(job_id = %job.id, user_id = %job.user_id, name = %job.name(), "Running scheduled job");

        let result = async {
            job.validate()?;
            let catalog = self.open_session(&job.user_id, now).await?;
            let summary = process_job(catalog.as_ref(), job, &self.settings.pipeline).await?;
            self.store.stamp_autorun(job.id, now).await?;
            Ok::<_, WorkerError>(summary)
        }
        .await;

        let duration_ms = started.elapsed().as_millis() as u64;
        match result {
            Ok(summary) => {
                info!(
                    job_id = %job.id,
                    tracks = summary.published,
                    duration_ms,
                    "Scheduled job succeeded"
                );
                JobOutcome::success(&summary, duration_ms)
            }
            Err(e) => {
                e.log();
                error!(job_id = %job.id, user_id = %job.user_id, error = %e, "Scheduled job failed");
                JobOutcome::from_error(&e, duration_ms)
            }
        }
    }

    /// Run one job immediately, regardless of its schedule or freshness
    ///
    /// `last_autorun` is left untouched. Any failure is wrapped in
    /// [`WorkerError::JobFailed`] carrying the job id.
    #[instrument(skip(self))]
    pub async fn run_job_now(&self, job_id: Uuid, now: DateTime<Utc>) -> WorkerResult<RunSummary> {
        let result = async {
            let job = self
                .store
                .get_job(job_id)
                .await?
                .ok_or(WorkerError::JobNotFound(job_id))?;
            job.validate()?;
            let catalog = self.open_session(&job.user_id, now).await?;
            process_job(catalog.as_ref(), &job, &self.settings.pipeline).await
        }
        .await;

        result.map_err(|e| WorkerError::job_failed(job_id, e))
    }

    pub async fn schedule_overview(&self, now: DateTime<Utc>) -> WorkerResult<Vec<ScheduleEntry>> {
        schedule_overview(self.store.as_ref(), now, self.settings.freeze_after).await
    }

    pub async fn reschedule_job(
        &self,
        job_id: Uuid,
        hour: Option<u8>,
        now: DateTime<Utc>,
    ) -> WorkerResult<Job> {
        reschedule_job(self.store.as_ref(), job_id, hour, now).await
    }

    /// Refresh, persist and validate the credentials of `user_id`
    async fn open_session(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> WorkerResult<Arc<dyn Catalog>> {
        let token = self
            .store
            .get_token_for_user(user_id)
            .await?
            .ok_or_else(|| WorkerError::TokenNotFound(user_id.to_string()))?;

        let current = self
            .connector
            .refresh_credentials_if_expired(&token, now)
            .await
            .map_err(|e| WorkerError::credential(user_id, e))?;
        if current != token {
            self.store.save_token(&current).await?;
            debug!(user_id, expires_at = %current.expires_at, "Saved refreshed token");
        }

        let catalog = self
            .connector
            .connect(&current)
            .map_err(|e| WorkerError::credential(user_id, e))?;
        let identity = catalog
            .current_identity()
            .await
            .map_err(|e| WorkerError::credential(user_id, e))?;
        if identity != user_id {
            return Err(WorkerError::credential(
                user_id,
                format!("token belongs to '{}'", identity),
            ));
        }

        Ok(catalog)
    }
}
