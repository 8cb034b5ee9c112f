//! # Media Types
//!
//! Plain data shared by the registry, the engine and the session poller:
//! recommendation output ([`MediaItem`]), the recommendation input
//! ([`RecommendationContext`]) and the live playback view a backend reports
//! ([`PlaybackSnapshot`]).

use chrono::Timelike;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of backend a service adapter talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceType {
    Music,
    Video,
    Social,
}

impl fmt::Display for ServiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Music => write!(f, "music"),
            Self::Video => write!(f, "video"),
            Self::Social => write!(f, "social"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Track,
    Playlist,
    Video,
}

/// One recommendation, produced fresh for every call and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artist: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artwork: Option<String>,
    pub uri: String,
    pub service_id: String,
    pub content_type: ContentType,
}

impl MediaItem {
    /// Track item with the conventional `<service>:track:<id>` URI.
    pub fn track(service_id: &str, id: &str, title: &str) -> Self {
        Self {
            id: id.to_string(),
            title: title.to_string(),
            artist: None,
            artwork: None,
            uri: format!("{service_id}:track:{id}"),
            service_id: service_id.to_string(),
            content_type: ContentType::Track,
        }
    }

    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }
}

/// Coarse time-of-day bucket; maps onto a `Vibe` node of the same name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
    Night,
}

impl TimeOfDay {
    /// Bucket for an hour in `0..24`.
    ///
    /// - 05–11 morning
    /// - 12–16 afternoon
    /// - 17–21 evening
    /// - otherwise night
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=11 => Self::Morning,
            12..=16 => Self::Afternoon,
            17..=21 => Self::Evening,
            _ => Self::Night,
        }
    }

    pub fn now() -> Self {
        Self::from_hour(chrono::Local::now().hour())
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Morning => "morning",
            Self::Afternoon => "afternoon",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }
}

/// Input to [`crate::engine::RecommendationEngine::recommend`].
///
/// Every field has a fixed effect on ranking:
///
/// - `seeds`: graph node ids expanded directly.
/// - `current_track`: the playing item's id; added as a seed when it is a graph
///   node, and never recommended back.
/// - `mood`: label of a `Vibe` node; that node becomes a seed.
/// - `time_of_day`: a `Vibe` node labelled with the bucket name becomes a seed.
/// - `limit`: maximum number of items returned.
///
/// Backends receive the whole context on fallback and may use any field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationContext {
    #[serde(default)]
    pub seeds: Vec<String>,
    #[serde(default)]
    pub current_track: Option<String>,
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub time_of_day: Option<TimeOfDay>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl RecommendationContext {
    pub fn with_seeds<I, S>(seeds: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            seeds: seeds.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn mood(mut self, mood: impl Into<String>) -> Self {
        self.mood = Some(mood.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// What a backend reports about its player at one poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub item_id: String,
    pub title: String,
    pub progress_ms: u64,
    pub is_playing: bool,
}
