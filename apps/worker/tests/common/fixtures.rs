//! Test fixtures for worker integration tests
//!
//! Provides a fixed clock, catalog items, tokens and a job builder.

use cadence_catalog_client::{AudioFeatures, PlaylistItem};
use cadence_test_utils::TrackFixture;
use cadence_worker::models::{Bounds, Job, PlaylistRef, RecipeLine, Token};
use chrono::{DateTime, Duration, TimeZone, Utc};

/// 2024-05-01 07:30 UTC; jobs scheduled at hour 7 are due
pub fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 7, 30, 0).unwrap()
}

pub const DUE_HOUR: u8 = 7;

/// Convert a track fixture into a playlist item
pub fn item(track: &TrackFixture) -> PlaylistItem {
    serde_json::from_value(track.to_item_json()).unwrap()
}

/// Playlist item with a null track
pub fn null_item() -> PlaylistItem {
    serde_json::from_value(cadence_test_utils::null_track_item()).unwrap()
}

/// `count` distinct tracks with ids `{prefix}-0` .. `{prefix}-{count-1}`
pub fn numbered_items(prefix: &str, count: usize) -> Vec<PlaylistItem> {
    (0..count)
        .map(|i| {
            let id = format!("{}-{}", prefix, i);
            item(&TrackFixture::new(&id, &format!("Track {}", id)))
        })
        .collect()
}

/// Items for the given track ids
pub fn items_with_ids(ids: &[&str]) -> Vec<PlaylistItem> {
    ids.iter()
        .map(|id| item(&TrackFixture::new(id, &format!("Track {}", id))))
        .collect()
}

/// Audio features on the catalog's 0.0 - 1.0 scale
pub fn features(id: &str, energy: f64, danceability: f64, acousticness: f64) -> AudioFeatures {
    AudioFeatures {
        id: id.to_string(),
        energy: Some(energy),
        danceability: Some(danceability),
        acousticness: Some(acousticness),
        duration_ms: Some(200_000),
    }
}

/// Token valid for another hour at [`fixed_now`]
pub fn valid_token(user_id: &str) -> Token {
    Token {
        user_id: user_id.to_string(),
        access_token: format!("access-{}", user_id),
        refresh_token: format!("refresh-{}", user_id),
        expires_at: fixed_now() + Duration::hours(1),
    }
}

/// Token that expired ten minutes before [`fixed_now`]
pub fn expired_token(user_id: &str) -> Token {
    Token {
        expires_at: fixed_now() - Duration::minutes(10),
        ..valid_token(user_id)
    }
}

pub fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Builder for jobs used in pipeline and scheduler tests
pub struct JobBuilder {
    job: Job,
}

impl JobBuilder {
    /// Unscheduled job writing to `target`, edited one day before [`fixed_now`]
    pub fn new(user_id: &str, target: &str) -> Self {
        let mut job = Job::new(user_id, PlaylistRef::new(target, format!("{} mix", target)));
        job.last_updated = Some(fixed_now() - Duration::days(1));
        Self { job }
    }

    pub fn source(mut self, playlist_id: &str, quantity: i64) -> Self {
        self.job
            .recipe
            .push(RecipeLine::new(playlist_id, playlist_id, quantity));
        self
    }

    pub fn scheduled_at(mut self, hour: u8) -> Self {
        self.job.scheduled_time = Some(hour);
        self
    }

    pub fn due(self) -> Self {
        self.scheduled_at(DUE_HOUR)
    }

    pub fn edited_days_ago(mut self, days: i64) -> Self {
        self.job.last_updated = Some(fixed_now() - Duration::days(days));
        self
    }

    pub fn never_edited(mut self) -> Self {
        self.job.last_updated = None;
        self
    }

    pub fn banned_genres(mut self, genres: &[&str]) -> Self {
        self.job.banned_genres = ids(genres);
        self
    }

    pub fn genre_exceptions(mut self, artist_names: &[&str]) -> Self {
        self.job.exceptions_to_banned_genres = ids(artist_names);
        self
    }

    pub fn banned_tracks(mut self, track_ids: &[&str]) -> Self {
        self.job.banned_tracks = ids(track_ids);
        self
    }

    pub fn banned_song_titles(mut self, titles: &[&str]) -> Self {
        self.job.banned_song_titles = ids(titles);
        self
    }

    pub fn ban_skits(mut self) -> Self {
        self.job.ban_skits = true;
        self
    }

    pub fn min_popularity(mut self, min: u32) -> Self {
        self.job.bounds.popularity = Bounds::at_least(min);
        self
    }

    pub fn energy_between(mut self, min: f64, max: f64) -> Self {
        self.job.bounds.energy = Bounds::new(Some(min), Some(max));
        self
    }

    pub fn pinned(mut self, track_ids: &[&str]) -> Self {
        self.job.last_tracks = ids(track_ids);
        self
    }

    pub fn description(mut self, text: &str) -> Self {
        self.job.description = text.to_string();
        self
    }

    pub fn build(self) -> Job {
        self.job
    }
}
