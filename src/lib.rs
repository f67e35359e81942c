//! streamify - terminal client for StreamHive
//!
//! Resolves StreamHive movies and episodes to playable sources and plays them
//! through mpv under a [`PlaybackSession`] that restores the last position,
//! syncs progress and drives a ratatui control overlay.
//!
//! # Modules
//!
//! - `models` - Catalog, playback and progress data structures
//! - `api` - StreamHive REST client
//! - `stream` - Storage, resolution, progress persistence, media backends and the session
//! - `ui` - Player screen
//! - `app` - Terminal input mapping
//! - `cli` / `commands` - Command line surface

pub mod api;
pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod models;
pub mod stream;
pub mod ui;

// Re-export commonly used types
pub use models::{
    ContentDetail, ContentKind, ContentSummary, Episode, ErrorInfo, MediaErrorKind, Notice,
    PlaybackPhase, PlaybackState, PlaybackTarget, ProgressRecord, RemoteProgress, Season,
    UserProfile,
};

pub use api::{ApiError, StreamHiveClient};
pub use app::App;
pub use config::Config;
pub use stream::{PlaybackSession, SessionConfig, UserAction};
