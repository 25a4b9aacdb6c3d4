//! Playlist job records
//!
//! A job describes one target playlist: where its tracks come from (the
//! recipe), what must never appear in it (ban lists and attribute bounds),
//! what is always appended (the pinned tail) and when it is refreshed.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{WorkerError, WorkerResult};

/// Reference to a catalog playlist
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

impl PlaylistRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// One recipe ingredient: draw `quantity` random tracks from `source`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeLine {
    pub source: PlaylistRef,
    /// Stored values may be blank or textual; anything below 1 disables the line
    #[serde(default, deserialize_with = "deserialize_quantity")]
    pub quantity: i64,
}

impl RecipeLine {
    pub fn new(source_id: impl Into<String>, source_name: impl Into<String>, quantity: i64) -> Self {
        Self {
            source: PlaylistRef::new(source_id, source_name),
            quantity,
        }
    }

    /// Number of tracks to draw, or `None` when the line is disabled
    pub fn sample_size(&self) -> Option<usize> {
        usize::try_from(self.quantity).ok().filter(|n| *n >= 1)
    }
}

fn deserialize_quantity<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawQuantity {
        Integer(i64),
        Float(f64),
        Text(String),
    }

    match Option::<RawQuantity>::deserialize(deserializer)? {
        None => Ok(0),
        Some(RawQuantity::Integer(n)) => Ok(n),
        Some(RawQuantity::Float(f)) => Ok(f.trunc() as i64),
        Some(RawQuantity::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                Ok(0)
            } else {
                text.parse()
                    .map_err(|_| de::Error::custom(format!("invalid quantity '{}'", text)))
            }
        }
    }
}

/// Ordered list of recipe lines
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Recipe(Vec<RecipeLine>);

impl Recipe {
    pub fn new(lines: Vec<RecipeLine>) -> Self {
        Self(lines)
    }

    pub fn lines(&self) -> &[RecipeLine] {
        &self.0
    }

    /// Lines that contribute tracks, in recipe order
    pub fn eligible_lines(&self) -> impl Iterator<Item = &RecipeLine> {
        self.0.iter().filter(|line| line.sample_size().is_some())
    }

    pub fn push(&mut self, line: RecipeLine) {
        self.0.push(line);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Drop lines whose source playlist already appeared earlier.
    ///
    /// Returns the number of lines removed.
    pub fn dedup_sources(&mut self) -> usize {
        let before = self.0.len();
        let mut seen = HashSet::new();
        self.0.retain(|line| seen.insert(line.source.id.clone()));
        before - self.0.len()
    }
}

impl From<Vec<RecipeLine>> for Recipe {
    fn from(lines: Vec<RecipeLine>) -> Self {
        Self(lines)
    }
}

impl FromIterator<RecipeLine> for Recipe {
    fn from_iter<I: IntoIterator<Item = RecipeLine>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Inclusive optional range; an absent side is unconstrained
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<T>,
}

impl<T> Default for Bounds<T> {
    fn default() -> Self {
        Self {
            min: None,
            max: None,
        }
    }
}

/// Which side of a range a value fell outside of
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoundViolation<T> {
    BelowMin(T),
    AboveMax(T),
}

impl<T: PartialOrd + Copy> Bounds<T> {
    pub fn new(min: Option<T>, max: Option<T>) -> Self {
        Self { min, max }
    }

    pub fn at_least(min: T) -> Self {
        Self::new(Some(min), None)
    }

    pub fn at_most(max: T) -> Self {
        Self::new(None, Some(max))
    }

    pub fn is_unbounded(&self) -> bool {
        self.min.is_none() && self.max.is_none()
    }

    /// Returns the violated limit, if `value` lies outside the range
    pub fn check(&self, value: T) -> Option<BoundViolation<T>> {
        if let Some(min) = self.min {
            if value < min {
                return Some(BoundViolation::BelowMin(min));
            }
        }
        if let Some(max) = self.max {
            if value > max {
                return Some(BoundViolation::AboveMax(max));
            }
        }
        None
    }

    fn is_inverted(&self) -> bool {
        matches!((self.min, self.max), (Some(min), Some(max)) if min > max)
    }
}

/// Audio-attribute range constraints
///
/// Energy, danceability and acousticness use the 0-100 scale, duration is in
/// milliseconds and popularity is 0-100.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttributeBounds {
    pub energy: Bounds<f64>,
    pub danceability: Bounds<f64>,
    pub acousticness: Bounds<f64>,
    pub duration_ms: Bounds<u64>,
    pub popularity: Bounds<u32>,
}

impl AttributeBounds {
    pub fn is_unbounded(&self) -> bool {
        self.energy.is_unbounded()
            && self.danceability.is_unbounded()
            && self.acousticness.is_unbounded()
            && self.duration_ms.is_unbounded()
            && self.popularity.is_unbounded()
    }

    fn inverted_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.energy.is_inverted() {
            fields.push("energy");
        }
        if self.danceability.is_inverted() {
            fields.push("danceability");
        }
        if self.acousticness.is_inverted() {
            fields.push("acousticness");
        }
        if self.duration_ms.is_inverted() {
            fields.push("duration_ms");
        }
        if self.popularity.is_inverted() {
            fields.push("popularity");
        }
        fields
    }
}

/// How recently a job was edited, relative to the freeze threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    Fresh,
    NeverEdited,
    Stale { days: i64 },
    FromFuture,
}

impl Freshness {
    pub fn is_frozen(self) -> bool {
        matches!(self, Self::NeverEdited | Self::Stale { .. })
    }
}

/// A stored playlist job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub user_id: String,
    pub target: PlaylistRef,
    /// UTC hour of day the job is auto-run at; `None` disables auto-runs
    pub scheduled_time: Option<u8>,
    pub recipe: Recipe,
    pub banned_artists: Vec<String>,
    pub banned_albums: Vec<String>,
    pub banned_tracks: Vec<String>,
    pub banned_genres: Vec<String>,
    /// Track titles banned regardless of case
    #[serde(default)]
    pub banned_song_titles: Vec<String>,
    /// Artist names exempt from genre bans
    pub exceptions_to_banned_genres: Vec<String>,
    pub ban_skits: bool,
    /// Track ids appended after the shuffled survivors on every run
    pub last_tracks: Vec<String>,
    pub description: String,
    pub bounds: AttributeBounds,
    pub last_updated: Option<DateTime<Utc>>,
    pub last_autorun: Option<DateTime<Utc>>,
}

impl Job {
    /// Create an empty, unscheduled job for `target`
    pub fn new(user_id: impl Into<String>, target: PlaylistRef) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.into(),
            target,
            scheduled_time: None,
            recipe: Recipe::default(),
            banned_artists: Vec::new(),
            banned_albums: Vec::new(),
            banned_tracks: Vec::new(),
            banned_genres: Vec::new(),
            banned_song_titles: Vec::new(),
            exceptions_to_banned_genres: Vec::new(),
            ban_skits: false,
            last_tracks: Vec::new(),
            description: String::new(),
            bounds: AttributeBounds::default(),
            last_updated: None,
            last_autorun: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.target.name
    }

    /// Check the invariants a stored job must satisfy
    pub fn validate(&self) -> WorkerResult<()> {
        if self.user_id.trim().is_empty() {
            return Err(WorkerError::InvalidJobData(format!(
                "job {} has no owner",
                self.id
            )));
        }
        if self.target.id.trim().is_empty() {
            return Err(WorkerError::InvalidJobData(format!(
                "job {} has no target playlist",
                self.id
            )));
        }
        if let Some(hour) = self.scheduled_time {
            validate_hour(hour)?;
        }
        let inverted = self.bounds.inverted_fields();
        if !inverted.is_empty() {
            return Err(WorkerError::InvalidJobData(format!(
                "job {} has min above max for: {}",
                self.id,
                inverted.join(", ")
            )));
        }
        Ok(())
    }

    /// Whether the job is scheduled for the hour of `now` (UTC)
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_time.map(u32::from) == Some(now.hour())
    }

    /// Classify the last user edit against the freeze threshold
    pub fn freshness(&self, now: DateTime<Utc>, freeze_after: Duration) -> Freshness {
        match self.last_updated {
            None => Freshness::NeverEdited,
            Some(updated) if updated > now => Freshness::FromFuture,
            Some(updated) => {
                let age = now - updated;
                if age > freeze_after {
                    Freshness::Stale {
                        days: age.num_days(),
                    }
                } else {
                    Freshness::Fresh
                }
            }
        }
    }

    pub fn is_frozen(&self, now: DateTime<Utc>, freeze_after: Duration) -> bool {
        self.freshness(now, freeze_after).is_frozen()
    }

    /// Record a user edit; `last_updated` never moves backwards
    pub fn record_edit(&mut self, now: DateTime<Utc>) {
        self.last_updated = Some(match self.last_updated {
            Some(previous) if previous > now => previous,
            _ => now,
        });
    }

    /// Record a scheduler-triggered publish
    pub fn record_autorun(&mut self, now: DateTime<Utc>) {
        self.last_autorun = Some(now);
    }

    /// Change the auto-run hour (`None` disables auto-runs)
    pub fn set_schedule(&mut self, hour: Option<u8>) -> WorkerResult<()> {
        if let Some(hour) = hour {
            validate_hour(hour)?;
        }
        self.scheduled_time = hour;
        Ok(())
    }
}

fn validate_hour(hour: u8) -> WorkerResult<()> {
    if hour > 23 {
        return Err(WorkerError::InvalidJobData(format!(
            "scheduled hour must be between 0 and 23, got {}",
            hour
        )));
    }
    Ok(())
}
