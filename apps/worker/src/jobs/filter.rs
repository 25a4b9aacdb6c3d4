//! Filter chain
//!
//! A job's ban lists and attribute bounds compile into a list of rules. A
//! track is banned as soon as one rule fires; the firing rule explains itself
//! through a [`BanReason`].

use std::collections::HashSet;
use std::fmt;

use cadence_catalog_client::AudioFeatures;
use tracing::debug;

use crate::models::{AttributeBounds, BoundViolation, Bounds, CandidateTrack, Job, TrackAttributes};

/// Everything the rules may inspect about one track
#[derive(Debug, Clone, Copy)]
pub struct TrackContext<'a> {
    pub track: &'a CandidateTrack,
    /// Genres of the primary artist, when known
    pub genres: Option<&'a HashSet<String>>,
    pub features: Option<&'a AudioFeatures>,
}

/// Rule that removed a track
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanRule {
    Genre,
    Artist,
    Album,
    Track,
    SongTitle,
    Skit,
    Energy,
    Danceability,
    Acousticness,
    Duration,
    Popularity,
}

impl fmt::Display for BanRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Genre => "banned genre",
            Self::Artist => "banned artist",
            Self::Album => "banned album",
            Self::Track => "banned track",
            Self::SongTitle => "banned song title",
            Self::Skit => "skit",
            Self::Energy => "energy",
            Self::Danceability => "danceability",
            Self::Acousticness => "acousticness",
            Self::Duration => "duration",
            Self::Popularity => "popularity",
        };
        f.write_str(name)
    }
}

/// Human-readable explanation of a ban
#[derive(Debug, Clone, PartialEq)]
pub struct BanReason {
    pub rule: BanRule,
    pub track_name: String,
    pub artist_name: String,
    /// The value that triggered the rule
    pub detail: String,
}

impl fmt::Display for BanReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "removed '{}' by {}: {} ({})",
            self.track_name, self.artist_name, self.rule, self.detail
        )
    }
}

#[derive(Debug, Clone)]
enum Rule {
    Genre {
        banned: HashSet<String>,
        exempt_artists: HashSet<String>,
    },
    Artist(HashSet<String>),
    Album(HashSet<String>),
    Track(HashSet<String>),
    /// Lowercased titles
    SongTitle(HashSet<String>),
    Skit,
    Ranges(AttributeBounds),
}

/// Compiled ban rules of one job
#[derive(Debug, Clone, Default)]
pub struct FilterChain {
    rules: Vec<Rule>,
}

impl FilterChain {
    /// Compile the rules whose job fields are set
    pub fn for_job(job: &Job) -> Self {
        let mut rules = Vec::new();
        let set = |values: &[String]| values.iter().cloned().collect::<HashSet<_>>();

        if !job.banned_genres.is_empty() {
            rules.push(Rule::Genre {
                banned: set(&job.banned_genres),
                exempt_artists: set(&job.exceptions_to_banned_genres),
            });
        }
        if !job.banned_artists.is_empty() {
            rules.push(Rule::Artist(set(&job.banned_artists)));
        }
        if !job.banned_albums.is_empty() {
            rules.push(Rule::Album(set(&job.banned_albums)));
        }
        if !job.banned_tracks.is_empty() {
            rules.push(Rule::Track(set(&job.banned_tracks)));
        }
        if !job.banned_song_titles.is_empty() {
            rules.push(Rule::SongTitle(
                job.banned_song_titles
                    .iter()
                    .map(|title| title.to_lowercase())
                    .collect(),
            ));
        }
        if job.ban_skits {
            rules.push(Rule::Skit);
        }
        if !job.bounds.is_unbounded() {
            rules.push(Rule::Ranges(job.bounds.clone()));
        }

        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// First rule that bans the track, if any
    pub fn check(&self, ctx: &TrackContext<'_>) -> Option<BanReason> {
        self.rules.iter().find_map(|rule| rule.check(ctx))
    }

    /// Whether the track must be removed; the reason is logged at debug level
    pub fn is_banned(&self, ctx: &TrackContext<'_>) -> bool {
        match self.check(ctx) {
            Some(reason) => {
                debug!(track_id = %ctx.track.id, rule = %reason.rule, "{}", reason);
                true
            }
            None => false,
        }
    }
}

impl Rule {
    fn check(&self, ctx: &TrackContext<'_>) -> Option<BanReason> {
        let track = ctx.track;
        let (rule, detail) = match self {
            Self::Genre {
                banned,
                exempt_artists,
            } => {
                if exempt_artists.contains(&track.artist_name) {
                    return None;
                }
                let genre = ctx.genres?.iter().find(|g| banned.contains(*g))?;
                (BanRule::Genre, genre.clone())
            }
            Self::Artist(ids) => {
                let id = track.artist_id.as_ref().filter(|id| ids.contains(*id))?;
                (BanRule::Artist, id.clone())
            }
            Self::Album(ids) => {
                let id = track.album_id.as_ref().filter(|id| ids.contains(*id))?;
                (BanRule::Album, id.clone())
            }
            Self::Track(ids) => {
                if !ids.contains(&track.id) {
                    return None;
                }
                (BanRule::Track, track.id.clone())
            }
            Self::SongTitle(titles) => {
                if !titles.contains(&track.name.to_lowercase()) {
                    return None;
                }
                (BanRule::SongTitle, track.name.clone())
            }
            Self::Skit => {
                if !track.name.to_lowercase().contains("skit") {
                    return None;
                }
                (BanRule::Skit, track.name.clone())
            }
            Self::Ranges(bounds) => {
                let attrs = TrackAttributes::collect(track, ctx.features);
                range_violation(bounds, &attrs)?
            }
        };

        Some(BanReason {
            rule,
            track_name: track.name.clone(),
            artist_name: track.artist_name.clone(),
            detail,
        })
    }
}

fn range_violation(bounds: &AttributeBounds, attrs: &TrackAttributes) -> Option<(BanRule, String)> {
    check_range(BanRule::Energy, &bounds.energy, attrs.energy)
        .or_else(|| check_range(BanRule::Danceability, &bounds.danceability, attrs.danceability))
        .or_else(|| check_range(BanRule::Acousticness, &bounds.acousticness, attrs.acousticness))
        .or_else(|| check_range(BanRule::Duration, &bounds.duration_ms, attrs.duration_ms))
        .or_else(|| check_range(BanRule::Popularity, &bounds.popularity, attrs.popularity))
}

fn check_range<T>(rule: BanRule, bounds: &Bounds<T>, value: Option<T>) -> Option<(BanRule, String)>
where
    T: PartialOrd + Copy + fmt::Display,
{
    let value = value?;
    let detail = match bounds.check(value)? {
        BoundViolation::BelowMin(min) => format!("{} below minimum {}", value, min),
        BoundViolation::AboveMax(max) => format!("{} above maximum {}", value, max),
    };
    Some((rule, detail))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PlaylistRef;

    fn job() -> Job {
        Job::new("user-1", PlaylistRef::new("target", "Target"))
    }

    fn track(name: &str) -> CandidateTrack {
        CandidateTrack {
            id: "t1".to_string(),
            name: name.to_string(),
            artist_id: Some("a1".to_string()),
            artist_name: "Kendrick Lamar".to_string(),
            album_id: Some("al1".to_string()),
            popularity: Some(60),
            duration_ms: Some(200_000),
        }
    }

    fn features(energy: f64) -> AudioFeatures {
        AudioFeatures {
            id: "t1".to_string(),
            energy: Some(energy),
            danceability: Some(0.5),
            acousticness: Some(0.1),
            duration_ms: Some(200_000),
        }
    }

    fn ctx<'a>(
        track: &'a CandidateTrack,
        genres: Option<&'a HashSet<String>>,
        features: Option<&'a AudioFeatures>,
    ) -> TrackContext<'a> {
        TrackContext {
            track,
            genres,
            features,
        }
    }

    #[test]
    fn test_empty_chain_bans_nothing() {
        let chain = FilterChain::for_job(&job());
        assert!(chain.is_empty());
        assert!(!chain.is_banned(&ctx(&track("Skit"), None, None)));
    }

    #[test]
    fn test_genre_ban_with_artist_exception() {
        let mut job = job();
        job.banned_genres = vec!["rap".to_string()];
        let genres = HashSet::from(["rap".to_string(), "west coast rap".to_string()]);
        let kendrick = track("Alright");
        let mut other = track("Other");
        other.artist_name = "Someone Else".to_string();

        let chain = FilterChain::for_job(&job);
        let reason = chain.check(&ctx(&other, Some(&genres), None)).unwrap();
        assert_eq!(reason.rule, BanRule::Genre);
        assert_eq!(reason.detail, "rap");
        assert!(chain.is_banned(&ctx(&kendrick, Some(&genres), None)));

        job.exceptions_to_banned_genres = vec!["Kendrick Lamar".to_string()];
        let chain = FilterChain::for_job(&job);
        assert!(!chain.is_banned(&ctx(&kendrick, Some(&genres), None)));
        assert!(chain.is_banned(&ctx(&other, Some(&genres), None)));
    }

    #[test]
    fn test_genre_match_is_exact() {
        let mut job = job();
        job.banned_genres = vec!["rap".to_string()];
        let genres = HashSet::from(["west coast rap".to_string()]);
        let chain = FilterChain::for_job(&job);
        assert!(!chain.is_banned(&ctx(&track("Song"), Some(&genres), None)));
        assert!(!chain.is_banned(&ctx(&track("Song"), None, None)));
    }

    #[test]
    fn test_id_bans() {
        let t = track("Song");

        let mut by_artist = job();
        by_artist.banned_artists = vec!["a1".to_string()];
        assert_eq!(
            FilterChain::for_job(&by_artist).check(&ctx(&t, None, None)).unwrap().rule,
            BanRule::Artist
        );

        let mut by_album = job();
        by_album.banned_albums = vec!["al1".to_string()];
        assert_eq!(
            FilterChain::for_job(&by_album).check(&ctx(&t, None, None)).unwrap().rule,
            BanRule::Album
        );

        let mut by_track = job();
        by_track.banned_tracks = vec!["t1".to_string()];
        assert_eq!(
            FilterChain::for_job(&by_track).check(&ctx(&t, None, None)).unwrap().rule,
            BanRule::Track
        );

        let mut unrelated = job();
        unrelated.banned_artists = vec!["a2".to_string()];
        assert!(!FilterChain::for_job(&unrelated).is_banned(&ctx(&t, None, None)));
    }

    #[test]
    fn test_song_title_ban_matches_whole_title_ignoring_case() {
        let mut job = job();
        job.banned_song_titles = vec!["White Noise".to_string()];
        let chain = FilterChain::for_job(&job);

        let reason = chain.check(&ctx(&track("WHITE NOISE"), None, None)).unwrap();
        assert_eq!(reason.rule, BanRule::SongTitle);
        assert_eq!(reason.detail, "WHITE NOISE");
        assert!(chain.is_banned(&ctx(&track("white noise"), None, None)));
        assert!(!chain.is_banned(&ctx(&track("White Noise (Remix)"), None, None)));
        assert!(!chain.is_banned(&ctx(&track("Noise"), None, None)));
    }

    #[test]
    fn test_skit_ban_is_case_insensitive() {
        let mut job = job();
        job.ban_skits = true;
        let chain = FilterChain::for_job(&job);

        assert!(chain.is_banned(&ctx(&track("Intro (SKIT)"), None, None)));
        assert!(chain.is_banned(&ctx(&track("Skit #2"), None, None)));
        assert!(!chain.is_banned(&ctx(&track("Sketch"), None, None)));
    }

    #[test]
    fn test_popularity_boundary() {
        let mut job = job();
        job.bounds.popularity = Bounds::at_least(50);
        let chain = FilterChain::for_job(&job);

        let mut unpopular = track("Deep Cut");
        unpopular.popularity = Some(49);
        let reason = chain.check(&ctx(&unpopular, None, None)).unwrap();
        assert_eq!(reason.rule, BanRule::Popularity);
        assert_eq!(reason.detail, "49 below minimum 50");

        let mut borderline = track("Hit");
        borderline.popularity = Some(50);
        assert!(!chain.is_banned(&ctx(&borderline, None, None)));
    }

    #[test]
    fn test_energy_uses_scaled_value() {
        let mut job = job();
        job.bounds.energy = Bounds::new(Some(20.0), Some(80.0));
        let chain = FilterChain::for_job(&job);
        let t = track("Song");

        let loud = features(0.9);
        let reason = chain.check(&ctx(&t, None, Some(&loud))).unwrap();
        assert_eq!(reason.rule, BanRule::Energy);
        assert!(reason.detail.contains("above maximum 80"));

        let calm = features(0.5);
        assert!(!chain.is_banned(&ctx(&t, None, Some(&calm))));
    }

    #[test]
    fn test_missing_attribute_is_unconstrained() {
        let mut job = job();
        job.bounds.energy = Bounds::at_least(20.0);
        job.bounds.duration_ms = Bounds::at_most(1);
        let chain = FilterChain::for_job(&job);

        assert!(!chain.is_banned(&ctx(&track("Song"), None, None)));
    }

    #[test]
    fn test_reason_display() {
        let reason = BanReason {
            rule: BanRule::Skit,
            track_name: "Skit".to_string(),
            artist_name: "Artist".to_string(),
            detail: "Skit".to_string(),
        };
        assert_eq!(reason.to_string(), "removed 'Skit' by Artist: skit (Skit)");
    }
}
