//! StreamHive REST API client
//!
//! Catalog lookup, authentication and watch-progress endpoints.
//! Every authenticated call takes the bearer token explicitly; the client
//! itself holds no session state.

use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{
    ContentDetail, ContentKind, ContentSummary, Episode, ProgressRecord, RemoteProgress, Season,
    UserProfile,
};

/// StreamHive API error types
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Resource not found (404)")]
    NotFound,

    #[error("Not authorized ({0})")]
    Unauthorized(u16),

    #[error("Rate limited (429)")]
    RateLimited,

    #[error("Server error: {0}")]
    ServerError(u16),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Content id must be numeric: {0}")]
    InvalidContentId(String),

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
}

/// Successful login payload
#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub token: String,
    pub user: UserProfile,
}

/// StreamHive API client
pub struct StreamHiveClient {
    base_url: String,
    client: reqwest::Client,
}

impl StreamHiveClient {
    /// Create a client for the given API origin
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .unwrap_or_default(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send a request and decode a JSON body, mapping HTTP status to [`ApiError`]
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        let response = request.header("Accept", "application/json").send().await?;

        match response.status() {
            status if status.is_success() => {
                let body = response.text().await?;
                serde_json::from_str(&body)
                    .map_err(|e| ApiError::InvalidResponse(format!("JSON parse error: {}", e)))
            }
            status => Err(status_error(status)),
        }
    }

    /// Send a request where only the status matters
    async fn send_empty(&self, request: RequestBuilder) -> Result<(), ApiError> {
        let response = request.send().await?;
        match response.status() {
            status if status.is_success() => Ok(()),
            status => Err(status_error(status)),
        }
    }

    fn get(&self, token: &str, endpoint: &str) -> RequestBuilder {
        self.client
            .get(format!("{}{}", self.base_url, endpoint))
            .bearer_auth(token)
    }

    fn post(&self, token: &str, endpoint: &str) -> RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, endpoint))
            .bearer_auth(token)
    }

    fn delete(&self, token: &str, endpoint: &str) -> RequestBuilder {
        self.client
            .delete(format!("{}{}", self.base_url, endpoint))
            .bearer_auth(token)
    }

    /// Log in with email and password
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginResponse, ApiError> {
        let request = self
            .client
            .post(format!("{}/api/auth/login", self.base_url))
            .json(&json!({ "email": email, "senha": password }));

        let raw: LoginRaw = self.send_json(request).await?;
        if raw.token.is_empty() {
            return Err(ApiError::InvalidResponse("login returned no token".into()));
        }
        Ok(LoginResponse {
            token: raw.token,
            user: raw.user.into_profile(),
        })
    }

    /// Look up full detail for a content id.
    ///
    /// Films take precedence over series when the lookup matches both. For
    /// series the remote progress row, when present, decides the current
    /// season/episode.
    pub async fn content_detail(&self, token: &str, id: &str) -> Result<ContentDetail, ApiError> {
        let response = self.lookup(token, id).await?;

        if response.filmes.is_none() && response.series.is_none() {
            return Err(ApiError::InvalidResponse(
                "search response has neither films nor series".into(),
            ));
        }

        let (raw, kind) = match (response.filmes, response.series) {
            (Some(mut films), _) if !films.is_empty() => (films.swap_remove(0), ContentKind::Movie),
            (_, Some(mut series)) if !series.is_empty() => {
                (series.swap_remove(0), ContentKind::Series)
            }
            _ => return Err(ApiError::NotFound),
        };

        let mut detail = raw.into_detail(id, kind);

        if detail.description.is_empty() && detail.title != UNTITLED {
            match self.synopsis(token, &detail.title).await {
                Ok(Some(text)) => detail.description = text,
                Ok(None) => {}
                Err(e) => debug!("Synopsis lookup failed for {}: {}", id, e),
            }
        }

        if detail.kind == ContentKind::Series {
            match self.watch_progress(token).await {
                Ok(rows) => apply_remote_position(&mut detail, &rows),
                Err(e) => warn!("Progress lookup failed for {}: {}", id, e),
            }
        }

        Ok(detail)
    }

    /// Search the catalog by term; films are listed before series
    pub async fn search(&self, token: &str, term: &str) -> Result<Vec<ContentSummary>, ApiError> {
        let response = self.lookup(token, term).await?;
        Ok(response.into_summaries())
    }

    async fn lookup(&self, token: &str, term: &str) -> Result<SearchResponse, ApiError> {
        let endpoint = format!("/api/search?termo={}", urlencoding::encode(term));
        self.send_json(self.get(token, &endpoint)).await
    }

    /// Fetch a synopsis by title
    pub async fn synopsis(&self, token: &str, title: &str) -> Result<Option<String>, ApiError> {
        let endpoint = format!("/api/sinopse?nome={}", urlencoding::encode(title));
        let response: SynopsisResponse = self.send_json(self.get(token, &endpoint)).await?;
        Ok(response.sinopse.filter(|s| !s.is_empty()))
    }

    /// List every progress row stored for the user
    pub async fn watch_progress(&self, token: &str) -> Result<Vec<RemoteProgress>, ApiError> {
        let response: ProgressList = self
            .send_json(self.get(token, "/api/watch/progresso"))
            .await?;
        Ok(response.into_rows())
    }

    /// List titles the user has started but not finished
    pub async fn continue_watching(&self, token: &str) -> Result<Vec<RemoteProgress>, ApiError> {
        let response: ProgressList = self
            .send_json(self.get(token, "/api/continue-watching"))
            .await?;
        Ok(response.into_rows())
    }

    /// Store a progress checkpoint
    pub async fn save_progress(&self, token: &str, record: &ProgressRecord) -> Result<(), ApiError> {
        let body = ProgressPayload {
            conteudo_id: numeric_id(&record.content_id)?,
            tempo: record.elapsed_seconds,
            temporada: record.season.clone(),
            episodio: record.episode.clone(),
        };
        self.send_empty(self.post(token, "/api/watch/progresso").json(&body))
            .await
    }

    /// Record that a content item was watched to the end
    pub async fn mark_watched(&self, token: &str, content_id: &str) -> Result<(), ApiError> {
        let body = json!({ "conteudo_id": numeric_id(content_id)? });
        self.send_empty(self.post(token, "/api/watch").json(&body)).await
    }

    /// List the user's favorites. A body that is not a list counts as empty.
    pub async fn favorites(&self, token: &str) -> Result<Vec<ContentSummary>, ApiError> {
        let response: FavoritesResponse =
            self.send_json(self.get(token, "/api/favorites")).await?;
        match response {
            FavoritesResponse::List(rows) => {
                Ok(rows.into_iter().map(FavoriteRaw::into_summary).collect())
            }
            FavoritesResponse::Other(body) => {
                debug!("Favorites body is not a list: {}", body);
                Ok(Vec::new())
            }
        }
    }

    pub async fn add_favorite(&self, token: &str, content_id: &str) -> Result<(), ApiError> {
        let body = json!({ "conteudo_id": numeric_id(content_id)? });
        self.send_empty(self.post(token, "/api/favorites").json(&body)).await
    }

    pub async fn remove_favorite(&self, token: &str, content_id: &str) -> Result<(), ApiError> {
        let endpoint = format!("/api/favorites/{}", numeric_id(content_id)?);
        self.send_empty(self.delete(token, &endpoint)).await
    }
}

fn status_error(status: StatusCode) -> ApiError {
    match status {
        StatusCode::NOT_FOUND => ApiError::NotFound,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ApiError::Unauthorized(status.as_u16()),
        StatusCode::TOO_MANY_REQUESTS => ApiError::RateLimited,
        status => ApiError::ServerError(status.as_u16()),
    }
}

/// The API keys content by integer id
fn numeric_id(id: &str) -> Result<u64, ApiError> {
    id.trim()
        .parse()
        .map_err(|_| ApiError::InvalidContentId(id.to_string()))
}

/// Override a series' default position with the user's saved one
fn apply_remote_position(detail: &mut ContentDetail, rows: &[RemoteProgress]) {
    let saved = rows.iter().find(|row| row.content_id == detail.id);
    if let Some(row) = saved {
        let season = row.season.as_deref().and_then(parse_number);
        let episode = row.episode.as_deref().and_then(parse_number);
        if let (Some(season), Some(episode)) = (season, episode) {
            detail.current_season = Some(season);
            detail.current_episode = Some(episode);
        }
    }
}

fn parse_number(s: &str) -> Option<u32> {
    s.trim().parse().ok()
}

const UNTITLED: &str = "Untitled";

// =============================================================================
// Response Structures (internal deserialization)
// =============================================================================

/// Accepts `"3"`, `3` or null
fn string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Deserialize)]
struct LoginRaw {
    #[serde(default)]
    token: String,
    user: UserRaw,
}

#[derive(Debug, Deserialize)]
struct UserRaw {
    #[serde(default, deserialize_with = "string_or_number")]
    id: Option<String>,
    #[serde(default)]
    nome: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    url_avatar: Option<String>,
}

impl UserRaw {
    fn into_profile(self) -> UserProfile {
        UserProfile {
            id: self.id.unwrap_or_default(),
            name: self.nome.unwrap_or_default(),
            email: self.email.unwrap_or_default(),
            avatar_url: self.url_avatar.filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    filmes: Option<Vec<ContentRaw>>,
    series: Option<Vec<ContentRaw>>,
}

impl SearchResponse {
    fn into_summaries(self) -> Vec<ContentSummary> {
        let films = self
            .filmes
            .unwrap_or_default()
            .into_iter()
            .map(|raw| raw.into_summary(ContentKind::Movie));
        let series = self
            .series
            .unwrap_or_default()
            .into_iter()
            .map(|raw| raw.into_summary(ContentKind::Series));
        films.chain(series).collect()
    }
}

#[derive(Debug, Deserialize)]
struct ContentRaw {
    #[serde(default, deserialize_with = "string_or_number")]
    id: Option<String>,
    nome: Option<String>,
    poster: Option<String>,
    categoria: Option<String>,
    sinopse: Option<String>,
    url: Option<String>,
    #[serde(default)]
    episodios: Option<Vec<EpisodeRaw>>,
}

impl ContentRaw {
    fn into_summary(self, kind: ContentKind) -> ContentSummary {
        ContentSummary {
            id: self.id,
            title: self
                .nome
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| UNTITLED.to_string()),
            kind: Some(kind),
            category: self.categoria.filter(|c| !c.is_empty()),
            poster_url: self.poster.filter(|p| !p.is_empty()),
        }
    }

    fn into_detail(self, id: &str, kind: ContentKind) -> ContentDetail {
        let seasons = match kind {
            ContentKind::Series => group_seasons(self.episodios.unwrap_or_default()),
            ContentKind::Movie => Vec::new(),
        };

        // First episode of the first season until remote progress says otherwise
        let (current_season, current_episode) = seasons
            .first()
            .and_then(|s| s.episodes.first().map(|e| (Some(s.number), Some(e.number))))
            .unwrap_or((None, None));

        ContentDetail {
            id: id.to_string(),
            title: self
                .nome
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| UNTITLED.to_string()),
            kind,
            poster_url: self.poster.filter(|p| !p.is_empty()),
            category: self.categoria.filter(|c| !c.is_empty()),
            description: self.sinopse.unwrap_or_default(),
            video_url: self.url.filter(|u| !u.is_empty()),
            seasons,
            current_season,
            current_episode,
        }
    }
}

#[derive(Debug, Deserialize)]
struct EpisodeRaw {
    #[serde(default, deserialize_with = "string_or_number")]
    temporada: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    episodio: Option<String>,
    #[serde(default)]
    url: String,
}

/// Group flat episode rows by season number, both ascending
fn group_seasons(episodes: Vec<EpisodeRaw>) -> Vec<Season> {
    let mut by_season: BTreeMap<u32, Vec<Episode>> = BTreeMap::new();

    for raw in episodes {
        let season = raw.temporada.as_deref().and_then(parse_number).unwrap_or(1);
        let Some(number) = raw.episodio.as_deref().and_then(parse_number) else {
            debug!("Skipping episode without a numeric index in season {}", season);
            continue;
        };
        by_season.entry(season).or_default().push(Episode {
            season,
            number,
            url: raw.url,
        });
    }

    by_season
        .into_iter()
        .map(|(number, mut episodes)| {
            episodes.sort_by_key(|e| e.number);
            Season { number, episodes }
        })
        .collect()
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FavoritesResponse {
    List(Vec<FavoriteRaw>),
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
struct FavoriteRaw {
    #[serde(default, deserialize_with = "string_or_number")]
    id: Option<String>,
    #[serde(alias = "nome")]
    title: Option<String>,
    #[serde(alias = "poster")]
    poster_url: Option<String>,
    #[serde(alias = "categoria")]
    category: Option<String>,
}

impl FavoriteRaw {
    fn into_summary(self) -> ContentSummary {
        ContentSummary {
            id: self.id,
            title: self
                .title
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| UNTITLED.to_string()),
            kind: None,
            category: self.category.filter(|c| !c.is_empty()),
            poster_url: self.poster_url.filter(|p| !p.is_empty()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SynopsisResponse {
    sinopse: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProgressList {
    #[serde(default)]
    data: Vec<ProgressRaw>,
}

impl ProgressList {
    fn into_rows(self) -> Vec<RemoteProgress> {
        self.data
            .into_iter()
            .filter_map(|row| {
                Some(RemoteProgress {
                    content_id: row.conteudo_id?,
                    elapsed_seconds: row.tempo.unwrap_or(0.0).max(0.0) as u64,
                    season: row.temporada,
                    episode: row.episodio,
                    title: row.nome,
                })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct ProgressRaw {
    #[serde(default, deserialize_with = "string_or_number")]
    conteudo_id: Option<String>,
    tempo: Option<f64>,
    #[serde(default, deserialize_with = "string_or_number")]
    temporada: Option<String>,
    #[serde(default, deserialize_with = "string_or_number")]
    episodio: Option<String>,
    nome: Option<String>,
}

#[derive(Debug, Serialize)]
struct ProgressPayload {
    conteudo_id: u64,
    tempo: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    temporada: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    episodio: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episode(season: Option<&str>, number: Option<&str>, url: &str) -> EpisodeRaw {
        EpisodeRaw {
            temporada: season.map(String::from),
            episodio: number.map(String::from),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_group_seasons_orders_numerically() {
        let seasons = group_seasons(vec![
            episode(Some("10"), Some("1"), "s10e1"),
            episode(Some("2"), Some("2"), "s2e2"),
            episode(Some("2"), Some("1"), "s2e1"),
            episode(None, Some("1"), "s1e1"),
        ]);

        let numbers: Vec<u32> = seasons.iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![1, 2, 10]);
        assert_eq!(seasons[1].episodes[0].url, "s2e1");
        assert_eq!(seasons[1].episodes[1].url, "s2e2");
    }

    #[test]
    fn test_group_seasons_skips_non_numeric_episode() {
        let seasons = group_seasons(vec![
            episode(Some("1"), Some("extra"), "x"),
            episode(Some("1"), Some("1"), "y"),
        ]);
        assert_eq!(seasons.len(), 1);
        assert_eq!(seasons[0].episodes.len(), 1);
    }

    #[test]
    fn test_numeric_id() {
        assert_eq!(numeric_id("42").unwrap(), 42);
        assert!(matches!(numeric_id("abc"), Err(ApiError::InvalidContentId(_))));
    }

    #[test]
    fn test_remote_position_requires_both_fields() {
        let raw = ContentRaw {
            id: None,
            nome: Some("Show".into()),
            poster: None,
            categoria: None,
            sinopse: None,
            url: None,
            episodios: Some(vec![
                episode(Some("1"), Some("1"), "a"),
                episode(Some("2"), Some("4"), "b"),
            ]),
        };
        let mut detail = raw.into_detail("7", ContentKind::Series);
        assert_eq!(detail.current_season, Some(1));

        let partial = RemoteProgress {
            content_id: "7".into(),
            elapsed_seconds: 10,
            season: Some("2".into()),
            episode: None,
            title: None,
        };
        apply_remote_position(&mut detail, &[partial]);
        assert_eq!(detail.current_season, Some(1));

        let full = RemoteProgress {
            content_id: "7".into(),
            elapsed_seconds: 10,
            season: Some("2".into()),
            episode: Some("4".into()),
            title: None,
        };
        apply_remote_position(&mut detail, &[full]);
        assert_eq!(detail.current_season, Some(2));
        assert_eq!(detail.current_episode, Some(4));
    }

    #[test]
    fn test_search_lists_films_before_series() {
        let response: SearchResponse = serde_json::from_value(json!({
            "filmes": [{ "id": 9, "nome": "Film", "categoria": "" }],
            "series": [{ "id": "42", "nome": "Show", "categoria": "DRAMA" }, { "nome": "" }]
        }))
        .unwrap();

        let summaries = response.into_summaries();
        let titles: Vec<&str> = summaries.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["Film", "Show", UNTITLED]);
        assert_eq!(summaries[0].id.as_deref(), Some("9"));
        assert_eq!(summaries[0].kind, Some(ContentKind::Movie));
        assert_eq!(summaries[0].category, None);
        assert_eq!(summaries[1].category.as_deref(), Some("DRAMA"));
        assert_eq!(summaries[2].id, None);
    }

    #[test]
    fn test_favorites_accepts_either_field_naming() {
        let response: FavoritesResponse = serde_json::from_value(json!([
            { "id": 5, "title": "Vegas", "poster_url": "/p.jpg", "category": "DRAMA" },
            { "id": "6", "nome": "Outro", "categoria": "ACAO" }
        ]))
        .unwrap();
        let FavoritesResponse::List(rows) = response else {
            panic!("expected a list");
        };
        let summaries: Vec<_> = rows.into_iter().map(FavoriteRaw::into_summary).collect();
        assert_eq!(summaries[0].title, "Vegas");
        assert_eq!(summaries[0].poster_url.as_deref(), Some("/p.jpg"));
        assert_eq!(summaries[1].id.as_deref(), Some("6"));
        assert_eq!(summaries[1].title, "Outro");
        assert_eq!(summaries[1].category.as_deref(), Some("ACAO"));

        let other: FavoritesResponse = serde_json::from_value(json!({ "message": "none" })).unwrap();
        assert!(matches!(other, FavoritesResponse::Other(_)));
    }

    #[test]
    fn test_progress_payload_omits_missing_episode() {
        let payload = ProgressPayload {
            conteudo_id: 42,
            tempo: 120,
            temporada: None,
            episodio: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json, json!({ "conteudo_id": 42, "tempo": 120 }));
    }
}
