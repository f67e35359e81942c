//! Content resolution
//!
//! Maps a content id plus optional season/episode to a playable raw URL and a
//! display title.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::api::{ApiError, StreamHiveClient};
use crate::models::{ContentDetail, ContentKind};
use crate::stream::storage::SessionProvider;

/// Why a request could not be resolved to a source
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("Content id must not be empty")]
    EmptyContentId,

    #[error("Not logged in")]
    Unauthenticated,

    #[error("Content {0} not found")]
    ContentNotFound(String),

    #[error("Season {season} not found")]
    SeasonNotFound { season: u32 },

    #[error("Episode {episode} of season {season} not found")]
    EpisodeNotFound { season: u32, episode: u32 },

    #[error("Content {0} has no playable source")]
    NoPlayableSource(String),

    #[error("Lookup failed: {0}")]
    Request(String),
}

/// What the caller wants to play
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentRequest {
    pub content_id: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

impl ContentRequest {
    pub fn new(content_id: impl Into<String>) -> Result<Self, ResolutionError> {
        let content_id = content_id.into().trim().to_string();
        if content_id.is_empty() {
            return Err(ResolutionError::EmptyContentId);
        }
        Ok(Self {
            content_id,
            season: None,
            episode: None,
        })
    }

    /// Request a specific episode; zero is treated as "not given"
    pub fn with_episode(mut self, season: Option<u32>, episode: Option<u32>) -> Self {
        self.season = season.filter(|&s| s > 0);
        self.episode = episode.filter(|&e| e > 0);
        self
    }
}

/// Episodes either side of the resolved one, in catalog order, as
/// `(season, episode)` pairs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EpisodeNeighbors {
    pub previous: Option<(u32, u32)>,
    pub next: Option<(u32, u32)>,
}

impl EpisodeNeighbors {
    /// Neighbours of `(season, episode)` across every season of `detail`
    pub fn of(detail: &ContentDetail, season: u32, episode: u32) -> Self {
        let order: Vec<(u32, u32)> = detail
            .seasons
            .iter()
            .flat_map(|s| s.episodes.iter().map(move |e| (s.number, e.number)))
            .collect();

        let Some(index) = order.iter().position(|&pair| pair == (season, episode)) else {
            return Self::default();
        };
        Self {
            previous: index.checked_sub(1).map(|i| order[i]),
            next: order.get(index + 1).copied(),
        }
    }
}

/// Successful resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedContent {
    pub title: String,
    /// Un-proxied origin URL
    pub source_raw_url: String,
    pub season: Option<u32>,
    pub episode: Option<u32>,
    /// Always empty for movies
    pub neighbors: EpisodeNeighbors,
}

/// Resolves requests to playable sources
#[async_trait]
pub trait ContentResolver: Send + Sync {
    async fn resolve(&self, request: &ContentRequest) -> Result<ResolvedContent, ResolutionError>;
}

/// Pick the source for `request` out of a content detail.
///
/// Series fall back to the detail's current season/episode, then to 1.
/// Anything without seasons plays its direct video URL.
pub fn select_source(
    detail: &ContentDetail,
    request: &ContentRequest,
) -> Result<ResolvedContent, ResolutionError> {
    if detail.kind == ContentKind::Series && !detail.seasons.is_empty() {
        let season_number = request.season.or(detail.current_season).unwrap_or(1);
        let episode_number = request.episode.or(detail.current_episode).unwrap_or(1);

        let season = detail
            .season(season_number)
            .ok_or(ResolutionError::SeasonNotFound {
                season: season_number,
            })?;
        let episode = season
            .episode(episode_number)
            .ok_or(ResolutionError::EpisodeNotFound {
                season: season_number,
                episode: episode_number,
            })?;

        if episode.url.trim().is_empty() {
            return Err(ResolutionError::NoPlayableSource(detail.id.clone()));
        }

        return Ok(ResolvedContent {
            title: format!("{} - T{}E{}", detail.title, season_number, episode_number),
            source_raw_url: episode.url.clone(),
            season: Some(season_number),
            episode: Some(episode_number),
            neighbors: EpisodeNeighbors::of(detail, season_number, episode_number),
        });
    }

    match detail.video_url.as_deref().map(str::trim) {
        Some(url) if !url.is_empty() => Ok(ResolvedContent {
            title: detail.title.clone(),
            source_raw_url: url.to_string(),
            season: None,
            episode: None,
            neighbors: EpisodeNeighbors::default(),
        }),
        _ => Err(ResolutionError::NoPlayableSource(detail.id.clone())),
    }
}

/// Resolver backed by the StreamHive catalog
pub struct ApiResolver {
    client: Arc<StreamHiveClient>,
    session: Arc<dyn SessionProvider>,
}

impl ApiResolver {
    pub fn new(client: Arc<StreamHiveClient>, session: Arc<dyn SessionProvider>) -> Self {
        Self { client, session }
    }
}

#[async_trait]
impl ContentResolver for ApiResolver {
    async fn resolve(&self, request: &ContentRequest) -> Result<ResolvedContent, ResolutionError> {
        let token = self.session.token().ok_or(ResolutionError::Unauthenticated)?;

        let detail = self
            .client
            .content_detail(&token, &request.content_id)
            .await
            .map_err(|e| match e {
                ApiError::NotFound => ResolutionError::ContentNotFound(request.content_id.clone()),
                ApiError::Unauthorized(_) => ResolutionError::Unauthenticated,
                other => ResolutionError::Request(other.to_string()),
            })?;

        debug!("Resolved {} as {}", request.content_id, detail);
        select_source(&detail, request)
    }
}
