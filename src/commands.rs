//! CLI Command Handlers
//!
//! Each handler takes its parsed args, the shared [`Context`] and an
//! [`Output`], and returns an [`ExitCode`].

use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

use crate::api::{ApiError, StreamHiveClient};
use crate::cli::{
    ExitCode, FavoritesAction, FavoritesCmd, ForgetCmd, InfoCmd, LoginCmd, Output, ProgressCmd,
    SearchCmd, StatusOk, TargetArgs, WatchCmd, WatchSummary,
};
use crate::config::Config;
use crate::models::{format_time, PlaybackPhase, PlaybackTarget, ProgressRecord, RemoteProgress, UserProfile};
use crate::stream::mpv::{self, MpvElement, PlayerError};
use crate::stream::progress::{local_checkpoints, position_key};
use crate::stream::{
    ApiResolver, Collaborators, ContentRequest, ContentResolver, LocalStore, PlaybackSession,
    ResolutionError, SessionProvider, SyncedProgressStore, compose_source_url,
};
use crate::ui;

// =============================================================================
// Shared Context
// =============================================================================

/// Services shared by all commands
pub struct Context {
    pub config: Config,
    pub store: Arc<LocalStore>,
    pub client: Arc<StreamHiveClient>,
}

impl Context {
    /// Build from config, opening local storage at `storage` or the default path
    pub fn new(config: Config, storage: Option<PathBuf>) -> Self {
        let store = match storage.or_else(LocalStore::default_path) {
            Some(path) => LocalStore::open(path),
            None => {
                warn!("No data directory; local storage will not persist");
                LocalStore::in_memory()
            }
        };
        let client = StreamHiveClient::new(&config.api_base_url);
        Self {
            config,
            store: Arc::new(store),
            client: Arc::new(client),
        }
    }

    fn resolver(&self) -> ApiResolver {
        ApiResolver::new(self.client.clone(), self.store.clone())
    }

    fn require_token(&self, output: &Output) -> Result<String, ExitCode> {
        self.store.token().ok_or_else(|| {
            output.error(
                "Not logged in. Run `streamify login <email>` first.",
                ExitCode::NotAuthenticated,
            )
        })
    }
}

fn api_exit_code(e: &ApiError) -> ExitCode {
    match e {
        ApiError::NotFound => ExitCode::NotFound,
        ApiError::Unauthorized(_) => ExitCode::NotAuthenticated,
        ApiError::InvalidContentId(_) => ExitCode::InvalidArgs,
        _ => ExitCode::NetworkError,
    }
}

fn resolution_exit_code(e: &ResolutionError) -> ExitCode {
    match e {
        ResolutionError::EmptyContentId => ExitCode::InvalidArgs,
        ResolutionError::Unauthenticated => ExitCode::NotAuthenticated,
        ResolutionError::ContentNotFound(_)
        | ResolutionError::SeasonNotFound { .. }
        | ResolutionError::EpisodeNotFound { .. } => ExitCode::NotFound,
        ResolutionError::NoPlayableSource(_) => ExitCode::PlaybackFailed,
        ResolutionError::Request(_) => ExitCode::NetworkError,
    }
}

fn request_for(target: &TargetArgs) -> Result<ContentRequest, ResolutionError> {
    Ok(ContentRequest::new(&target.id)?.with_episode(target.season, target.episode))
}

fn print_or_fail<T: Serialize>(output: &Output, data: T) -> ExitCode {
    match output.print(data) {
        Ok(()) => ExitCode::Success,
        Err(e) => output.error(format!("Failed to serialize: {}", e), ExitCode::Error),
    }
}

// =============================================================================
// Session Commands
// =============================================================================

#[derive(Debug, Serialize)]
struct LoginSummary<'a> {
    status: &'static str,
    user: &'a UserProfile,
}

pub async fn login_cmd(cmd: LoginCmd, ctx: &Context, output: &Output) -> ExitCode {
    output.info(format!("Logging in as {}...", cmd.email));

    let login = match ctx.client.login(&cmd.email, &cmd.password).await {
        Ok(login) => login,
        Err(e) => return output.error(format!("Login failed: {}", e), api_exit_code(&e)),
    };

    if let Err(e) = ctx.store.save_session(&login.token, &login.user) {
        return output.error(format!("Could not store session: {}", e), ExitCode::Error);
    }
    info!("Logged in as {}", login.user.email);

    print_or_fail(
        output,
        LoginSummary {
            status: "ok",
            user: &login.user,
        },
    )
}

pub async fn logout_cmd(ctx: &Context, output: &Output) -> ExitCode {
    if let Err(e) = ctx.store.clear_session() {
        return output.error(format!("Could not clear session: {}", e), ExitCode::Error);
    }
    print_or_fail(output, StatusOk::default())
}

// =============================================================================
// Catalog Commands
// =============================================================================

pub async fn search_cmd(cmd: SearchCmd, ctx: &Context, output: &Output) -> ExitCode {
    let token = match ctx.require_token(output) {
        Ok(token) => token,
        Err(code) => return code,
    };

    output.info(format!("Searching for: {}", cmd.term));
    match ctx.client.search(&token, &cmd.term).await {
        Ok(mut results) => {
            results.truncate(cmd.limit);
            for result in &results {
                output.info(result);
            }
            print_or_fail(output, &results)
        }
        Err(e) => output.error(format!("Search failed: {}", e), api_exit_code(&e)),
    }
}

pub async fn info_cmd(cmd: InfoCmd, ctx: &Context, output: &Output) -> ExitCode {
    let token = match ctx.require_token(output) {
        Ok(token) => token,
        Err(code) => return code,
    };

    output.info(format!("Getting info for: {}", cmd.id));
    match ctx.client.content_detail(&token, &cmd.id).await {
        Ok(detail) => {
            output.info(&detail);
            print_or_fail(output, &detail)
        }
        Err(e) => output.error(format!("Info failed: {}", e), api_exit_code(&e)),
    }
}

/// Resolve a request and compose the proxied source URL
async fn resolve_target(ctx: &Context, args: &TargetArgs) -> Result<PlaybackTarget, ResolutionError> {
    let request = request_for(args)?;
    let resolved = ctx.resolver().resolve(&request).await?;
    let token = ctx.store.token();

    Ok(PlaybackTarget {
        source_url: compose_source_url(
            &ctx.config.proxy_base_url,
            &resolved.source_raw_url,
            token.as_deref(),
        ),
        display_title: resolved.title,
        content_id: request.content_id,
        season: resolved.season,
        episode: resolved.episode,
    })
}

pub async fn resolve_cmd(args: TargetArgs, ctx: &Context, output: &Output) -> ExitCode {
    match resolve_target(ctx, &args).await {
        Ok(target) => print_or_fail(output, &target),
        Err(e) => output.error(format!("Could not resolve {}: {}", args.id, e), resolution_exit_code(&e)),
    }
}

// =============================================================================
// Watch Command
// =============================================================================

pub async fn watch_cmd(cmd: WatchCmd, ctx: &Context, output: &Output) -> ExitCode {
    if let Err(code) = ctx.require_token(output) {
        return code;
    }
    if !mpv::is_available(&ctx.config.player).await {
        return output.error(
            format!("Player '{}' not found. Install mpv first.", ctx.config.player),
            ExitCode::PlaybackFailed,
        );
    }

    if cmd.direct {
        return watch_direct(&cmd.target, ctx, output).await;
    }

    let request = match request_for(&cmd.target) {
        Ok(request) => request,
        Err(e) => return output.error(e.to_string(), resolution_exit_code(&e)),
    };

    let session_provider: Arc<dyn SessionProvider> = ctx.store.clone();
    let deps = Collaborators {
        resolver: Arc::new(ctx.resolver()),
        progress: Arc::new(SyncedProgressStore::new(
            ctx.store.clone(),
            ctx.client.clone(),
            session_provider.clone(),
        )),
        session: session_provider,
    };
    let media = MpvElement::new(&ctx.config.player);
    let mut session = PlaybackSession::new(request, media, deps, ctx.config.session_config());

    session.start();
    if let Err(e) = ui::run_player(&mut session).await {
        return output.error(format!("Player screen failed: {}", e), ExitCode::Error);
    }

    let state = session.state();
    let summary = WatchSummary {
        content_id: session.request().content_id.clone(),
        title: session.title().to_string(),
        phase: format!("{:?}", session.phase()),
        position: state.current_time_seconds as u64,
        duration: state.duration_seconds as u64,
        error: state.load_error.as_ref().map(|e| e.to_string()),
    };

    if session.phase() == PlaybackPhase::LoadError {
        let message = summary.error.clone().unwrap_or_else(|| "Playback failed".into());
        return output.error(
            format!("{}\nOpen directly: {}", message, session.fallback_url()),
            ExitCode::PlaybackFailed,
        );
    }

    if output.json {
        return print_or_fail(output, &summary);
    }
    output.info(format!(
        "Stopped {} at {} / {}",
        summary.title,
        format_time(state.current_time_seconds),
        format_time(state.duration_seconds)
    ));
    ExitCode::Success
}

/// Hand the proxied source straight to the player, no session
async fn watch_direct(args: &TargetArgs, ctx: &Context, output: &Output) -> ExitCode {
    let target = match resolve_target(ctx, args).await {
        Ok(target) => target,
        Err(e) => return output.error(format!("Could not resolve {}: {}", args.id, e), resolution_exit_code(&e)),
    };

    output.info(format!("Opening {} in {}", target.display_title, ctx.config.player));
    match mpv::open_direct(&ctx.config.player, &target.source_url).await {
        Ok(()) => print_or_fail(output, &target),
        Err(e @ PlayerError::NotFound(_)) => output.error(e.to_string(), ExitCode::PlaybackFailed),
        Err(e) => output.error(format!("Playback failed: {}", e), ExitCode::PlaybackFailed),
    }
}

// =============================================================================
// Progress Commands
// =============================================================================

#[derive(Debug, Serialize)]
struct ProgressListing {
    local: Vec<ProgressRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    remote: Option<Vec<RemoteProgress>>,
}

pub async fn progress_cmd(cmd: ProgressCmd, ctx: &Context, output: &Output) -> ExitCode {
    let local = local_checkpoints(&ctx.store);
    for record in &local {
        output.info(record);
    }

    let remote = if cmd.remote {
        let token = match ctx.require_token(output) {
            Ok(token) => token,
            Err(code) => return code,
        };
        match ctx.client.watch_progress(&token).await {
            Ok(rows) => Some(rows),
            Err(e) => return output.error(format!("Fetching progress failed: {}", e), api_exit_code(&e)),
        }
    } else {
        None
    };

    print_or_fail(output, ProgressListing { local, remote })
}

pub async fn continue_cmd(ctx: &Context, output: &Output) -> ExitCode {
    let token = match ctx.require_token(output) {
        Ok(token) => token,
        Err(code) => return code,
    };

    match ctx.client.continue_watching(&token).await {
        Ok(rows) => {
            for row in &rows {
                output.info(row);
            }
            print_or_fail(output, &rows)
        }
        Err(e) => output.error(format!("Continue watching failed: {}", e), api_exit_code(&e)),
    }
}

pub async fn forget_cmd(cmd: ForgetCmd, ctx: &Context, output: &Output) -> ExitCode {
    match ctx.store.remove(&position_key(&cmd.id)) {
        Ok(()) => print_or_fail(output, StatusOk::default()),
        Err(e) => output.error(format!("Could not update storage: {}", e), ExitCode::Error),
    }
}

// =============================================================================
// Favorites Command
// =============================================================================

pub async fn favorites_cmd(cmd: FavoritesCmd, ctx: &Context, output: &Output) -> ExitCode {
    let token = match ctx.require_token(output) {
        Ok(token) => token,
        Err(code) => return code,
    };

    match cmd.action.unwrap_or(FavoritesAction::List) {
        FavoritesAction::List => match ctx.client.favorites(&token).await {
            Ok(favorites) => {
                for favorite in &favorites {
                    output.info(favorite);
                }
                print_or_fail(output, &favorites)
            }
            Err(e) => output.error(format!("Fetching favorites failed: {}", e), api_exit_code(&e)),
        },
        FavoritesAction::Add { id } => match ctx.client.add_favorite(&token, &id).await {
            Ok(()) => {
                info!("Added {} to favorites", id);
                print_or_fail(output, StatusOk::default())
            }
            Err(e) => output.error(format!("Could not add {}: {}", id, e), api_exit_code(&e)),
        },
        FavoritesAction::Remove { id } => match ctx.client.remove_favorite(&token, &id).await {
            Ok(()) => {
                info!("Removed {} from favorites", id);
                print_or_fail(output, StatusOk::default())
            }
            Err(e) => output.error(format!("Could not remove {}: {}", id, e), api_exit_code(&e)),
        },
    }
}
