//! Job and token persistence
//!
//! [`JobStore`] is the only way the runner reads or writes jobs and tokens.
//! [`PgJobStore`] implements it over PostgreSQL: scalar columns for the
//! fields the scheduler filters on, JSONB for recipes, ban lists, the pinned
//! tail and attribute bounds. JSONB columns are decoded per row, so one
//! malformed job never hides the others.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use uuid::Uuid;

use crate::error::{WorkerError, WorkerResult};
use crate::models::{Job, PlaylistRef, Token};

/// A stored job that could not be decoded into a [`Job`]
#[derive(Debug, Clone, PartialEq)]
pub struct InvalidJob {
    pub job_id: Uuid,
    pub reason: String,
}

/// One entry of a job listing
pub type StoredJob = Result<Job, InvalidJob>;

/// Data access used by the runner
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Every stored job; undecodable rows are listed as [`InvalidJob`]
    async fn list_jobs(&self) -> WorkerResult<Vec<StoredJob>>;

    async fn get_job(&self, job_id: Uuid) -> WorkerResult<Option<Job>>;

    /// Insert or replace a job
    async fn save_job(&self, job: &Job) -> WorkerResult<()>;

    /// Set `last_autorun` of one job, leaving every other field as stored
    async fn stamp_autorun(&self, job_id: Uuid, at: DateTime<Utc>) -> WorkerResult<()>;

    async fn get_token_for_user(&self, user_id: &str) -> WorkerResult<Option<Token>>;

    /// Insert or replace the token of `token.user_id`
    async fn save_token(&self, token: &Token) -> WorkerResult<()>;
}

/// Job row as stored in the `jobs` table
#[derive(Debug, sqlx::FromRow)]
struct JobRow {
    id: Uuid,
    user_id: String,
    playlist_id: String,
    playlist_name: String,
    scheduled_time: Option<i16>,
    recipe: Value,
    banned_artists: Value,
    banned_albums: Value,
    banned_tracks: Value,
    banned_genres: Value,
    banned_song_titles: Value,
    exceptions_to_banned_genres: Value,
    ban_skits: bool,
    last_tracks: Value,
    description: String,
    bounds: Value,
    last_updated: Option<DateTime<Utc>>,
    last_autorun: Option<DateTime<Utc>>,
}

impl TryFrom<JobRow> for Job {
    type Error = WorkerError;

    fn try_from(row: JobRow) -> WorkerResult<Self> {
        let scheduled_time = row
            .scheduled_time
            .map(|hour| {
                u8::try_from(hour)
                    .ok()
                    .filter(|h| *h <= 23)
                    .ok_or_else(|| {
                        WorkerError::InvalidJobData(format!(
                            "job {} has scheduled_time {}",
                            row.id, hour
                        ))
                    })
            })
            .transpose()?;
        let id = row.id;

        Ok(Job {
            id,
            user_id: row.user_id,
            target: PlaylistRef::new(row.playlist_id, row.playlist_name),
            scheduled_time,
            recipe: decode_column(id, "recipe", row.recipe)?,
            banned_artists: decode_column(id, "banned_artists", row.banned_artists)?,
            banned_albums: decode_column(id, "banned_albums", row.banned_albums)?,
            banned_tracks: decode_column(id, "banned_tracks", row.banned_tracks)?,
            banned_genres: decode_column(id, "banned_genres", row.banned_genres)?,
            banned_song_titles: decode_column(id, "banned_song_titles", row.banned_song_titles)?,
            exceptions_to_banned_genres: decode_column(
                id,
                "exceptions_to_banned_genres",
                row.exceptions_to_banned_genres,
            )?,
            ban_skits: row.ban_skits,
            last_tracks: decode_column(id, "last_tracks", row.last_tracks)?,
            description: row.description,
            bounds: decode_column(id, "bounds", row.bounds)?,
            last_updated: row.last_updated,
            last_autorun: row.last_autorun,
        })
    }
}

fn decode_column<T: DeserializeOwned>(job_id: Uuid, column: &str, value: Value) -> WorkerResult<T> {
    serde_json::from_value(value).map_err(|e| {
        WorkerError::InvalidJobData(format!("job {} has malformed {}: {}", job_id, column, e))
    })
}

/// Decode rows one by one, keeping undecodable rows as [`InvalidJob`]
fn decode_rows(rows: Vec<JobRow>) -> Vec<StoredJob> {
    rows.into_iter()
        .map(|row| {
            let job_id = row.id;
            Job::try_from(row).map_err(|e| {
                e.log();
                InvalidJob {
                    job_id,
                    reason: e.to_string(),
                }
            })
        })
        .collect()
}

/// Token row as stored in the `tokens` table
#[derive(Debug, sqlx::FromRow)]
struct TokenRow {
    user_id: String,
    access_token: String,
    refresh_token: String,
    expires_at: DateTime<Utc>,
}

impl From<TokenRow> for Token {
    fn from(row: TokenRow) -> Self {
        Self {
            user_id: row.user_id,
            access_token: row.access_token,
            refresh_token: row.refresh_token,
            expires_at: row.expires_at,
        }
    }
}

const JOB_COLUMNS: &str = "id, user_id, playlist_id, playlist_name, scheduled_time, recipe, \
     banned_artists, banned_albums, banned_tracks, banned_genres, banned_song_titles, \
     exceptions_to_banned_genres, ban_skits, last_tracks, description, bounds, last_updated, last_autorun";

/// PostgreSQL-backed job store
#[derive(Debug, Clone)]
pub struct PgJobStore {
    pool: PgPool,
}

impl PgJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the `jobs` and `tokens` tables if they do not exist
    pub async fn migrate(&self) -> WorkerResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| WorkerError::Internal(format!("migration failed: {}", e)))
    }
}

#[async_trait]
impl JobStore for PgJobStore {
    async fn list_jobs(&self) -> WorkerResult<Vec<StoredJob>> {
        let rows: Vec<JobRow> =
            sqlx::query_as(&format!("SELECT {} FROM jobs ORDER BY user_id, id", JOB_COLUMNS))
                .fetch_all(&self.pool)
                .await?;

        Ok(decode_rows(rows))
    }

    async fn get_job(&self, job_id: Uuid) -> WorkerResult<Option<Job>> {
        let row: Option<JobRow> =
            sqlx::query_as(&format!("SELECT {} FROM jobs WHERE id = $1", JOB_COLUMNS))
                .bind(job_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(Job::try_from).transpose()
    }

    async fn save_job(&self, job: &Job) -> WorkerResult<()> {
        job.validate()?;

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, user_id, playlist_id, playlist_name, scheduled_time, recipe,
                banned_artists, banned_albums, banned_tracks, banned_genres,
                banned_song_titles, exceptions_to_banned_genres, ban_skits, last_tracks,
                description, bounds, last_updated, last_autorun
            )
            VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18
            )
            ON CONFLICT (id) DO UPDATE SET
                user_id = EXCLUDED.user_id,
                playlist_id = EXCLUDED.playlist_id,
                playlist_name = EXCLUDED.playlist_name,
                scheduled_time = EXCLUDED.scheduled_time,
                recipe = EXCLUDED.recipe,
                banned_artists = EXCLUDED.banned_artists,
                banned_albums = EXCLUDED.banned_albums,
                banned_tracks = EXCLUDED.banned_tracks,
                banned_genres = EXCLUDED.banned_genres,
                banned_song_titles = EXCLUDED.banned_song_titles,
                exceptions_to_banned_genres = EXCLUDED.exceptions_to_banned_genres,
                ban_skits = EXCLUDED.ban_skits,
                last_tracks = EXCLUDED.last_tracks,
                description = EXCLUDED.description,
                bounds = EXCLUDED.bounds,
                last_updated = EXCLUDED.last_updated,
                last_autorun = EXCLUDED.last_autorun
            "#,
        )
        .bind(job.id)
        .bind(&job.user_id)
        .bind(&job.target.id)
        .bind(&job.target.name)
        .bind(job.scheduled_time.map(i16::from))
        .bind(Json(&job.recipe))
        .bind(Json(&job.banned_artists))
        .bind(Json(&job.banned_albums))
        .bind(Json(&job.banned_tracks))
        .bind(Json(&job.banned_genres))
        .bind(Json(&job.banned_song_titles))
        .bind(Json(&job.exceptions_to_banned_genres))
        .bind(job.ban_skits)
        .bind(Json(&job.last_tracks))
        .bind(&job.description)
        .bind(Json(&job.bounds))
        .bind(job.last_updated)
        .bind(job.last_autorun)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn stamp_autorun(&self, job_id: Uuid, at: DateTime<Utc>) -> WorkerResult<()> {
        let result = sqlx::query("UPDATE jobs SET last_autorun = $2 WHERE id = $1")
            .bind(job_id)
            .bind(at)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(WorkerError::JobNotFound(job_id));
        }
        Ok(())
    }

    async fn get_token_for_user(&self, user_id: &str) -> WorkerResult<Option<Token>> {
        let row: Option<TokenRow> = sqlx::query_as(
            "SELECT user_id, access_token, refresh_token, expires_at FROM tokens WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Token::from))
    }

    async fn save_token(&self, token: &Token) -> WorkerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tokens (user_id, access_token, refresh_token, expires_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                refresh_token = EXCLUDED.refresh_token,
                expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&token.user_id)
        .bind(&token.access_token)
        .bind(&token.refresh_token)
        .bind(token.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
