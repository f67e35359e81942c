//! Data structures shared across streamify
//!
//! Organized by domain:
//! - **Catalog**: content detail, seasons and episodes from the StreamHive API
//! - **Playback**: the resolved target, lifecycle phases and mutable playback state
//! - **Progress**: resume checkpoints, local and remote

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::{Duration, Instant};

// =============================================================================
// Catalog Models
// =============================================================================

/// Movie or series discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    Movie,
    Series,
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentKind::Movie => write!(f, "Movie"),
            ContentKind::Series => write!(f, "Series"),
        }
    }
}

/// A single playable episode of a series
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub season: u32,
    pub number: u32,
    pub url: String,
}

impl fmt::Display for Episode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}E{}", self.season, self.number)
    }
}

/// Episodes grouped under one season number
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Season {
    pub number: u32,
    pub episodes: Vec<Episode>,
}

impl Season {
    /// Find an episode by its number within this season
    pub fn episode(&self, number: u32) -> Option<&Episode> {
        self.episodes.iter().find(|e| e.number == number)
    }
}

/// Full detail for a movie or series as returned by the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentDetail {
    pub id: String,
    pub title: String,
    pub kind: ContentKind,
    pub poster_url: Option<String>,
    pub category: Option<String>,
    pub description: String,
    /// Direct media URL (movies only)
    pub video_url: Option<String>,
    /// Seasons ordered by number (series only)
    pub seasons: Vec<Season>,
    /// Season to play when none is requested
    pub current_season: Option<u32>,
    /// Episode to play when none is requested
    pub current_episode: Option<u32>,
}

impl ContentDetail {
    /// Find a season by number
    pub fn season(&self, number: u32) -> Option<&Season> {
        self.seasons.iter().find(|s| s.number == number)
    }

    /// Total number of episodes across all seasons
    pub fn episode_count(&self) -> usize {
        self.seasons.iter().map(|s| s.episodes.len()).sum()
    }
}

impl fmt::Display for ContentDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ContentKind::Movie => write!(f, "{} [{}]", self.title, self.kind),
            ContentKind::Series => write!(
                f,
                "{} [{}] - {} seasons, {} episodes",
                self.title,
                self.kind,
                self.seasons.len(),
                self.episode_count()
            ),
        }
    }
}

/// One row of a search or favorites listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentSummary {
    /// Missing for catalog rows the API returns without an id
    pub id: Option<String>,
    pub title: String,
    /// Unknown for favorites
    pub kind: Option<ContentKind>,
    pub category: Option<String>,
    pub poster_url: Option<String>,
}

impl fmt::Display for ContentSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.title)?;
        if let Some(kind) = self.kind {
            write!(f, " [{}]", kind)?;
        }
        if let Some(id) = &self.id {
            write!(f, " ({})", id)?;
        }
        Ok(())
    }
}

/// Authenticated user profile returned by login
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: String,
    pub avatar_url: Option<String>,
}

// =============================================================================
// Playback Models
// =============================================================================

/// Resolved descriptor for what to play.
///
/// Built once per resolution and never mutated; an episode switch replaces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackTarget {
    /// Final proxied URL handed to the media element
    pub source_url: String,
    pub display_title: String,
    pub content_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
}

impl fmt::Display for PlaybackTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_title, self.content_id)
    }
}

/// Lifecycle phase of one playback attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackPhase {
    /// Resolving content or waiting for media metadata
    #[default]
    Loading,
    /// Metadata loaded, not yet playing
    Ready,
    Playing,
    Paused,
    /// Reached natural end of media
    Ended,
    /// Resolution or media failure; details in [`PlaybackState::load_error`]
    LoadError,
}

impl PlaybackPhase {
    /// Whether media metadata is known in this phase
    pub fn has_media(&self) -> bool {
        matches!(
            self,
            PlaybackPhase::Ready | PlaybackPhase::Playing | PlaybackPhase::Paused | PlaybackPhase::Ended
        )
    }
}

impl fmt::Display for PlaybackPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaybackPhase::Loading => write!(f, "Loading..."),
            PlaybackPhase::Ready => write!(f, "Ready"),
            PlaybackPhase::Playing => write!(f, "▶ Playing"),
            PlaybackPhase::Paused => write!(f, "⏸ Paused"),
            PlaybackPhase::Ended => write!(f, "⏹ Ended"),
            PlaybackPhase::LoadError => write!(f, "Error"),
        }
    }
}

/// Media failure categories, numbered like HTML media error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaErrorKind {
    Aborted,
    Network,
    Decode,
    Unsupported,
}

impl MediaErrorKind {
    pub fn code(&self) -> u8 {
        match self {
            MediaErrorKind::Aborted => 1,
            MediaErrorKind::Network => 2,
            MediaErrorKind::Decode => 3,
            MediaErrorKind::Unsupported => 4,
        }
    }
}

impl fmt::Display for MediaErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaErrorKind::Aborted => write!(f, "playback aborted"),
            MediaErrorKind::Network => write!(f, "network error"),
            MediaErrorKind::Decode => write!(f, "decode error"),
            MediaErrorKind::Unsupported => write!(f, "unsupported source"),
        }
    }
}

/// User-visible failure of the current attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ErrorInfo {
    /// Content, season or episode could not be resolved to a source
    Resolution { message: String },
    /// The media element failed while loading or playing
    Media { kind: MediaErrorKind, message: String },
}

impl ErrorInfo {
    pub fn is_resolution(&self) -> bool {
        matches!(self, ErrorInfo::Resolution { .. })
    }

    pub fn message(&self) -> &str {
        match self {
            ErrorInfo::Resolution { message } | ErrorInfo::Media { message, .. } => message,
        }
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorInfo::Resolution { message } => write!(f, "{}", message),
            ErrorInfo::Media { kind, message } => {
                write!(f, "{} (code {}): {}", kind, kind.code(), message)
            }
        }
    }
}

/// Mutable playback state, written only by the playback session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub current_time_seconds: f64,
    pub duration_seconds: f64,
    pub controls_visible: bool,
    pub fullscreen: bool,
    pub load_error: Option<ErrorInfo>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            is_playing: false,
            current_time_seconds: 0.0,
            duration_seconds: 0.0,
            controls_visible: true,
            fullscreen: false,
            load_error: None,
        }
    }
}

impl PlaybackState {
    /// Seconds left until the end of media
    pub fn remaining_seconds(&self) -> f64 {
        (self.duration_seconds - self.current_time_seconds).max(0.0)
    }

    /// Progress ratio in 0.0..=1.0
    pub fn progress(&self) -> f64 {
        if self.duration_seconds <= 0.0 {
            0.0
        } else {
            (self.current_time_seconds / self.duration_seconds).clamp(0.0, 1.0)
        }
    }
}

/// Format seconds as `m:ss`
pub fn format_time(seconds: f64) -> String {
    let total = if seconds.is_finite() && seconds > 0.0 {
        seconds as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

/// Short-lived notification shown over the player
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub message: String,
    pub expires_at: Instant,
}

impl Notice {
    pub fn new(message: impl Into<String>, ttl: Duration) -> Self {
        Self {
            message: message.into(),
            expires_at: Instant::now() + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

// =============================================================================
// Progress Models
// =============================================================================

/// One watch-progress checkpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub content_id: String,
    pub elapsed_seconds: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub season: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode: Option<String>,
}

impl ProgressRecord {
    pub fn new(content_id: impl Into<String>, elapsed_seconds: u64) -> Self {
        Self {
            content_id: content_id.into(),
            elapsed_seconds,
            season: None,
            episode: None,
        }
    }

    /// Attach season/episode numbers when known
    pub fn with_episode(mut self, season: Option<u32>, episode: Option<u32>) -> Self {
        self.season = season.map(|s| s.to_string());
        self.episode = episode.map(|e| e.to_string());
        self
    }
}

impl fmt::Display for ProgressRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} @ {}",
            self.content_id,
            format_time(self.elapsed_seconds as f64)
        )?;
        if let (Some(s), Some(e)) = (&self.season, &self.episode) {
            write!(f, " (T{}E{})", s, e)?;
        }
        Ok(())
    }
}

/// Progress row as stored by the server (also used by continue-watching)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteProgress {
    pub content_id: String,
    pub elapsed_seconds: u64,
    pub season: Option<String>,
    pub episode: Option<String>,
    pub title: Option<String>,
}

impl fmt::Display for RemoteProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let title = self.title.as_deref().unwrap_or("Untitled");
        write!(
            f,
            "{} ({}) @ {}",
            title,
            self.content_id,
            format_time(self.elapsed_seconds as f64)
        )
    }
}
