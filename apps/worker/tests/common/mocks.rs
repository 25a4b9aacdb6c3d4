//! Mock services for worker integration tests
//!
//! Provides in-memory implementations of the catalog, connector and job
//! store traits so pipeline and scheduler behaviour can be tested without a
//! network or database.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use cadence_catalog_client::{AudioFeatures, CatalogError, CatalogResult, PlaylistItem};
use cadence_worker::catalog::{Catalog, CatalogConnector};
use cadence_worker::models::{Job, Token};
use cadence_worker::store::{InvalidJob, JobStore, StoredJob};
use cadence_worker::{WorkerError, WorkerResult};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// A call received by [`ScriptedCatalog`]
#[derive(Debug, Clone, PartialEq)]
pub enum CatalogCall {
    FetchPlaylist(String),
    AudioAttributes(Vec<String>),
    ArtistGenres(Vec<String>),
    Replace(String, Vec<String>),
    Append(String, Vec<String>),
    Description(String, String),
    Identity,
}

fn server_error(message: &str) -> CatalogError {
    CatalogError::Api {
        status: 500,
        message: message.to_string(),
    }
}

/// Catalog with scripted playlists, attributes and failures
#[derive(Default)]
pub struct ScriptedCatalog {
    identity: String,
    playlists: HashMap<String, Vec<PlaylistItem>>,
    failing_playlists: HashSet<String>,
    slow_playlists: HashMap<String, Duration>,
    features: HashMap<String, AudioFeatures>,
    genres: HashMap<String, HashSet<String>>,
    fail_audio_lookups: bool,
    fail_artist_lookups: bool,
    fail_replace: bool,
    fail_append_call: Option<usize>,
    fail_description: bool,
    fail_identity: bool,
    calls: Mutex<Vec<CatalogCall>>,
    appends: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedCatalog {
    /// Create a catalog whose credentials belong to `identity`
    pub fn new(identity: &str) -> Self {
        Self {
            identity: identity.to_string(),
            ..Self::default()
        }
    }

    pub fn with_playlist(mut self, playlist_id: &str, items: Vec<PlaylistItem>) -> Self {
        self.playlists.insert(playlist_id.to_string(), items);
        self
    }

    pub fn with_failing_playlist(mut self, playlist_id: &str) -> Self {
        self.failing_playlists.insert(playlist_id.to_string());
        self
    }

    /// Delay responses for `playlist_id`
    pub fn with_slow_playlist(
        mut self,
        playlist_id: &str,
        items: Vec<PlaylistItem>,
        delay: Duration,
    ) -> Self {
        self.playlists.insert(playlist_id.to_string(), items);
        self.slow_playlists.insert(playlist_id.to_string(), delay);
        self
    }

    pub fn with_features(mut self, features: Vec<AudioFeatures>) -> Self {
        self.features
            .extend(features.into_iter().map(|f| (f.id.clone(), f)));
        self
    }

    pub fn with_genres(mut self, artist_id: &str, genres: &[&str]) -> Self {
        self.genres.insert(
            artist_id.to_string(),
            genres.iter().map(|g| g.to_string()).collect(),
        );
        self
    }

    pub fn failing_audio_lookups(mut self) -> Self {
        self.fail_audio_lookups = true;
        self
    }

    pub fn failing_artist_lookups(mut self) -> Self {
        self.fail_artist_lookups = true;
        self
    }

    pub fn failing_replace(mut self) -> Self {
        self.fail_replace = true;
        self
    }

    /// Fail the append call with the given zero-based index
    pub fn failing_append(mut self, call_index: usize) -> Self {
        self.fail_append_call = Some(call_index);
        self
    }

    pub fn failing_description(mut self) -> Self {
        self.fail_description = true;
        self
    }

    pub fn failing_identity(mut self) -> Self {
        self.fail_identity = true;
        self
    }

    /// All calls received so far, in order
    pub fn calls(&self) -> Vec<CatalogCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Replace and append calls made against `playlist_id`
    pub fn writes_to(&self, playlist_id: &str) -> Vec<CatalogCall> {
        self.calls()
            .into_iter()
            .filter(|call| match call {
                CatalogCall::Replace(id, _) | CatalogCall::Append(id, _) => id == playlist_id,
                _ => false,
            })
            .collect()
    }

    /// Contents of `playlist_id` after replaying the writes
    pub fn published_tracks(&self, playlist_id: &str) -> Vec<String> {
        let mut tracks = Vec::new();
        for call in self.writes_to(playlist_id) {
            match call {
                CatalogCall::Replace(_, ids) => tracks = ids,
                CatalogCall::Append(_, ids) => tracks.extend(ids),
                _ => {}
            }
        }
        tracks
    }

    pub fn description_of(&self, playlist_id: &str) -> Option<String> {
        self.calls().into_iter().rev().find_map(|call| match call {
            CatalogCall::Description(id, text) if id == playlist_id => Some(text),
            _ => None,
        })
    }

    pub fn count_calls(&self, predicate: impl Fn(&CatalogCall) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }

    /// Highest number of playlist fetches that were running at once
    pub fn max_concurrent_fetches(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: CatalogCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Catalog for ScriptedCatalog {
    async fn fetch_playlist_tracks(&self, playlist_id: &str) -> CatalogResult<Vec<PlaylistItem>> {
        self.record(CatalogCall::FetchPlaylist(playlist_id.to_string()));

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.slow_playlists.get(playlist_id) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_playlists.contains(playlist_id) {
            return Err(server_error("source unavailable"));
        }
        self.playlists
            .get(playlist_id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound("Resource not found".to_string()))
    }

    async fn fetch_audio_attributes(
        &self,
        track_ids: &[String],
    ) -> CatalogResult<HashMap<String, AudioFeatures>> {
        self.record(CatalogCall::AudioAttributes(track_ids.to_vec()));
        if self.fail_audio_lookups {
            return Err(server_error("audio features unavailable"));
        }
        Ok(track_ids
            .iter()
            .filter_map(|id| self.features.get(id).map(|f| (id.clone(), f.clone())))
            .collect())
    }

    async fn fetch_artist_genres(
        &self,
        artist_ids: &[String],
    ) -> CatalogResult<HashMap<String, HashSet<String>>> {
        self.record(CatalogCall::ArtistGenres(artist_ids.to_vec()));
        if self.fail_artist_lookups {
            return Err(server_error("artists unavailable"));
        }
        Ok(artist_ids
            .iter()
            .map(|id| (id.clone(), self.genres.get(id).cloned().unwrap_or_default()))
            .collect())
    }

    async fn replace_playlist_contents(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> CatalogResult<()> {
        self.record(CatalogCall::Replace(
            playlist_id.to_string(),
            track_ids.to_vec(),
        ));
        if self.fail_replace {
            return Err(server_error("replace failed"));
        }
        Ok(())
    }

    async fn append_playlist_contents(
        &self,
        playlist_id: &str,
        track_ids: &[String],
    ) -> CatalogResult<()> {
        let index = self.appends.fetch_add(1, Ordering::SeqCst);
        if self.fail_append_call == Some(index) {
            return Err(server_error("append failed"));
        }
        self.record(CatalogCall::Append(
            playlist_id.to_string(),
            track_ids.to_vec(),
        ));
        Ok(())
    }

    async fn update_playlist_description(
        &self,
        playlist_id: &str,
        text: &str,
    ) -> CatalogResult<()> {
        self.record(CatalogCall::Description(
            playlist_id.to_string(),
            text.to_string(),
        ));
        if self.fail_description {
            return Err(CatalogError::Unauthorized("insufficient scope".to_string()));
        }
        Ok(())
    }

    async fn current_identity(&self) -> CatalogResult<String> {
        self.record(CatalogCall::Identity);
        if self.fail_identity {
            return Err(CatalogError::Unauthorized(
                "The access token expired".to_string(),
            ));
        }
        Ok(self.identity.clone())
    }
}

/// Connector handing out one scripted catalog per user
#[derive(Default)]
pub struct ScriptedConnector {
    catalogs: HashMap<String, Arc<ScriptedCatalog>>,
    failing_refresh: HashSet<String>,
    refreshes: Mutex<Vec<String>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(mut self, user_id: &str, catalog: Arc<ScriptedCatalog>) -> Self {
        self.catalogs.insert(user_id.to_string(), catalog);
        self
    }

    pub fn failing_refresh_for(mut self, user_id: &str) -> Self {
        self.failing_refresh.insert(user_id.to_string());
        self
    }

    /// Users whose tokens were refreshed, in order
    pub fn refreshes(&self) -> Vec<String> {
        self.refreshes.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogConnector for ScriptedConnector {
    async fn refresh_credentials_if_expired(
        &self,
        token: &Token,
        now: DateTime<Utc>,
    ) -> CatalogResult<Token> {
        if self.failing_refresh.contains(&token.user_id) {
            return Err(CatalogError::TokenRefresh {
                error: "invalid_grant".to_string(),
                description: "Refresh token revoked".to_string(),
            });
        }
        if !token.is_expired(now) {
            return Ok(token.clone());
        }

        self.refreshes.lock().unwrap().push(token.user_id.clone());
        Ok(Token {
            access_token: format!("refreshed-{}", token.user_id),
            expires_at: now + chrono::Duration::hours(1),
            ..token.clone()
        })
    }

    fn connect(&self, token: &Token) -> CatalogResult<Arc<dyn Catalog>> {
        self.catalogs
            .get(&token.user_id)
            .cloned()
            .map(|catalog| catalog as Arc<dyn Catalog>)
            .ok_or(CatalogError::MissingAccessToken)
    }
}

/// Job store kept in memory, preserving insertion order
#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: Mutex<Vec<StoredJob>>,
    tokens: Mutex<HashMap<String, Token>>,
    saved_tokens: Mutex<Vec<Token>>,
    job_saves: AtomicUsize,
    autorun_stamps: AtomicUsize,
    fail_listing: bool,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_job(self, job: Job) -> Self {
        self.jobs.lock().unwrap().push(Ok(job));
        self
    }

    /// Add a stored row that cannot be decoded into a job
    pub fn with_undecodable(self, job_id: Uuid, reason: &str) -> Self {
        self.jobs.lock().unwrap().push(Err(InvalidJob {
            job_id,
            reason: reason.to_string(),
        }));
        self
    }

    pub fn with_token(self, token: Token) -> Self {
        self.tokens
            .lock()
            .unwrap()
            .insert(token.user_id.clone(), token);
        self
    }

    pub fn failing_listing(mut self) -> Self {
        self.fail_listing = true;
        self
    }

    pub fn job(&self, job_id: Uuid) -> Option<Job> {
        self.jobs
            .lock()
            .unwrap()
            .iter()
            .filter_map(|entry| entry.as_ref().ok())
            .find(|job| job.id == job_id)
            .cloned()
    }

    pub fn token(&self, user_id: &str) -> Option<Token> {
        self.tokens.lock().unwrap().get(user_id).cloned()
    }

    /// Tokens passed to `save_token`, in order
    pub fn saved_tokens(&self) -> Vec<Token> {
        self.saved_tokens.lock().unwrap().clone()
    }

    /// Full job upserts, autorun stamps excluded
    pub fn job_saves(&self) -> usize {
        self.job_saves.load(Ordering::SeqCst)
    }

    pub fn autorun_stamps(&self) -> usize {
        self.autorun_stamps.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn list_jobs(&self) -> WorkerResult<Vec<StoredJob>> {
        if self.fail_listing {
            return Err(WorkerError::Internal("store offline".to_string()));
        }
        Ok(self.jobs.lock().unwrap().clone())
    }

    async fn get_job(&self, job_id: Uuid) -> WorkerResult<Option<Job>> {
        Ok(self.job(job_id))
    }

    async fn save_job(&self, job: &Job) -> WorkerResult<()> {
        job.validate()?;
        self.job_saves.fetch_add(1, Ordering::SeqCst);

        let mut jobs = self.jobs.lock().unwrap();
        let stored_id = |entry: &StoredJob| match entry {
            Ok(existing) => existing.id,
            Err(invalid) => invalid.job_id,
        };
        match jobs.iter_mut().find(|entry| stored_id(entry) == job.id) {
            Some(existing) => *existing = Ok(job.clone()),
            None => jobs.push(Ok(job.clone())),
        }
        Ok(())
    }

    async fn stamp_autorun(&self, job_id: Uuid, at: DateTime<Utc>) -> WorkerResult<()> {
        self.autorun_stamps.fetch_add(1, Ordering::SeqCst);

        let mut jobs = self.jobs.lock().unwrap();
        let job = jobs
            .iter_mut()
            .filter_map(|entry| entry.as_mut().ok())
            .find(|job| job.id == job_id)
            .ok_or(WorkerError::JobNotFound(job_id))?;
        job.record_autorun(at);
        Ok(())
    }

    async fn get_token_for_user(&self, user_id: &str) -> WorkerResult<Option<Token>> {
        Ok(self.token(user_id))
    }

    async fn save_token(&self, token: &Token) -> WorkerResult<()> {
        self.saved_tokens.lock().unwrap().push(token.clone());
        self.tokens
            .lock()
            .unwrap()
            .insert(token.user_id.clone(), token.clone());
        Ok(())
    }
}
