//! Playback session controller
//!
//! One [`PlaybackSession`] manages one content item (or episode) end to end:
//! it resolves the source, drives the media element, restores the saved
//! position, checkpoints progress on a wall-clock interval and hides the
//! controls overlay after a spell of inactivity.
//!
//! Everything runs on one event channel. Media events, user actions and timer
//! firings are queued as [`SessionEvent`]s and handled one at a time by
//! [`PlaybackSession::dispatch`]; network work is spawned and never awaited
//! inside a handler, except for the final checkpoint on close.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tracing::{debug, info, warn};

use crate::config::{DEFAULT_PROXY_URL, DEFAULT_WEB_URL};
use crate::models::{ErrorInfo, Notice, PlaybackPhase, PlaybackState, PlaybackTarget, ProgressRecord};
use crate::stream::media::{MediaElement, MediaError, MediaEvent, MediaEventSink};
use crate::stream::progress::ProgressStore;
use crate::stream::resolver::{
    ContentRequest, ContentResolver, EpisodeNeighbors, ResolutionError, ResolvedContent,
};
use crate::stream::source::compose_source_url;
use crate::stream::storage::SessionProvider;
use crate::stream::timer::ScheduledTask;

/// Message shown when a saved position is restored
pub const RESUME_NOTICE: &str = "Resuming where you left off";

/// Session tuning
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub proxy_base_url: String,
    pub web_base_url: String,
    pub checkpoint_interval: Duration,
    pub idle_timeout: Duration,
    pub skip_seconds: f64,
    /// Saved positions at or past this fraction of the duration are not restored
    pub resume_threshold: f64,
    pub notice_duration: Duration,
    /// Upper bound on waiting for the last progress writes when closing
    pub final_write_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            proxy_base_url: DEFAULT_PROXY_URL.to_string(),
            web_base_url: DEFAULT_WEB_URL.to_string(),
            checkpoint_interval: Duration::from_secs(30),
            idle_timeout: Duration::from_millis(3000),
            skip_seconds: 15.0,
            resume_threshold: 0.95,
            notice_duration: Duration::from_secs(3),
            final_write_timeout: Duration::from_secs(5),
        }
    }
}

/// Controls offered to the user
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UserAction {
    TogglePlayPause,
    /// Absolute position in seconds
    SeekTo(f64),
    SkipForward,
    SkipBackward,
    ToggleFullscreen,
    /// Pointer/touch/key activity with no other effect
    Activity,
    /// Re-run resolution, or reload the media after a media error
    Retry,
    NextEpisode,
    PreviousEpisode,
    Close,
}

/// Everything the session reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Media { attempt: u64, event: MediaEvent },
    User(UserAction),
    Resolved {
        generation: u64,
        result: Result<ResolvedContent, ResolutionError>,
    },
    CheckpointTick,
    IdleElapsed { generation: u64 },
}

/// External services the session depends on
#[derive(Clone)]
pub struct Collaborators {
    pub resolver: Arc<dyn ContentResolver>,
    pub progress: Arc<dyn ProgressStore>,
    pub session: Arc<dyn SessionProvider>,
}

/// Phase reached by applying a media event, or `None` when the event does
/// not move the machine.
///
/// | from                      | event          | to        |
/// |---------------------------|----------------|-----------|
/// | Loading                   | metadata       | Ready     |
/// | Ready, Paused, Ended      | play           | Playing   |
/// | Playing                   | pause          | Paused    |
/// | Ready, Playing, Paused    | ended          | Ended     |
/// | Loading, Ready, Playing, Paused | error    | LoadError |
pub fn next_phase(phase: PlaybackPhase, event: &MediaEvent) -> Option<PlaybackPhase> {
    use PlaybackPhase::*;

    match (phase, event) {
        (Loading, MediaEvent::MetadataLoaded { .. }) => Some(Ready),
        (Ready | Paused | Ended, MediaEvent::Play) => Some(Playing),
        (Playing, MediaEvent::Pause) => Some(Paused),
        (Ready | Playing | Paused, MediaEvent::Ended) => Some(Ended),
        (Loading | Ready | Playing | Paused, MediaEvent::Error(_)) => Some(LoadError),
        _ => None,
    }
}

/// Clamp a requested position into `[0, duration]`
pub fn clamp_position(position: f64, duration: f64) -> f64 {
    if !position.is_finite() {
        return 0.0;
    }
    position.clamp(0.0, duration.max(0.0))
}

/// Controls overlay sub-state
#[derive(Debug)]
enum Controls {
    /// Visible and not allowed to hide (anything but Playing)
    Pinned,
    /// Visible while playing; hides when the idle timer fires
    Shown {
        generation: u64,
        _timer: ScheduledTask,
    },
    Hidden,
}

/// Playback session for one content item
pub struct PlaybackSession<M: MediaElement> {
    request: ContentRequest,
    target: Option<PlaybackTarget>,
    neighbors: EpisodeNeighbors,
    phase: PlaybackPhase,
    state: PlaybackState,
    media: M,
    deps: Collaborators,
    config: SessionConfig,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
    /// Current load attempt; media events from older attempts are dropped
    attempt: u64,
    resolve_generation: u64,
    resolving: Option<ScheduledTask>,
    controls: Controls,
    idle_generation: u64,
    checkpoint_timer: Option<ScheduledTask>,
    pending_writes: Vec<JoinHandle<()>>,
    notices: Vec<Notice>,
    closed: bool,
}

impl<M: MediaElement> PlaybackSession<M> {
    pub fn new(
        request: ContentRequest,
        media: M,
        deps: Collaborators,
        config: SessionConfig,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            request,
            target: None,
            neighbors: EpisodeNeighbors::default(),
            phase: PlaybackPhase::Loading,
            state: PlaybackState::default(),
            media,
            deps,
            config,
            events_tx,
            events_rx,
            attempt: 0,
            resolve_generation: 0,
            resolving: None,
            controls: Controls::Pinned,
            idle_generation: 0,
            checkpoint_timer: None,
            pending_writes: Vec::new(),
            notices: Vec::new(),
            closed: false,
        }
    }

    // -------------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------------

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn target(&self) -> Option<&PlaybackTarget> {
        self.target.as_ref()
    }

    pub fn request(&self) -> &ContentRequest {
        &self.request
    }

    pub fn media(&self) -> &M {
        &self.media
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Episodes reachable with next/previous; empty until resolved
    pub fn neighbors(&self) -> EpisodeNeighbors {
        self.neighbors
    }

    pub fn is_checkpointing(&self) -> bool {
        self.checkpoint_timer.is_some()
    }

    /// Title for display; the content id until resolution succeeds
    pub fn title(&self) -> &str {
        self.target
            .as_ref()
            .map(|t| t.display_title.as_str())
            .unwrap_or(self.request.content_id.as_str())
    }

    /// Where the user can go when the player cannot be used
    pub fn fallback_url(&self) -> String {
        match &self.target {
            Some(target) => target.source_url.clone(),
            None => format!(
                "{}/conteudo/{}",
                self.config.web_base_url.trim_end_matches('/'),
                self.request.content_id
            ),
        }
    }

    /// Drain notices raised since the last call
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Wait for the next queued event
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.recv().await
    }

    /// Pop a queued event without waiting
    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        self.events_rx.try_recv().ok()
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Begin resolving the current request.
    ///
    /// The outcome arrives later as [`SessionEvent::Resolved`].
    pub fn start(&mut self) {
        if self.closed {
            return;
        }

        self.resolve_generation += 1;
        let generation = self.resolve_generation;
        self.phase = PlaybackPhase::Loading;
        self.state.load_error = None;
        self.pin_controls();

        let resolver = self.deps.resolver.clone();
        let request = self.request.clone();
        let tx = self.events_tx.clone();
        debug!("Resolving {:?}", request);
        self.resolving = Some(ScheduledTask::run(async move {
            let result = resolver.resolve(&request).await;
            let _ = tx.send(SessionEvent::Resolved { generation, result });
        }));
    }

    /// Handle one event to completion
    pub async fn dispatch(&mut self, event: SessionEvent) {
        if self.closed {
            return;
        }

        match event {
            SessionEvent::Media { attempt, event } => self.on_media(attempt, event),
            SessionEvent::User(action) => self.on_user(action).await,
            SessionEvent::Resolved { generation, result } => self.on_resolved(generation, result),
            SessionEvent::CheckpointTick => self.checkpoint(),
            SessionEvent::IdleElapsed { generation } => self.on_idle_elapsed(generation),
        }
    }

    fn on_resolved(&mut self, generation: u64, result: Result<ResolvedContent, ResolutionError>) {
        if generation != self.resolve_generation {
            debug!("Dropping stale resolution {}", generation);
            return;
        }
        self.resolving = None;

        match result {
            Ok(resolved) => {
                let token = self.deps.session.token();
                let source_url = compose_source_url(
                    &self.config.proxy_base_url,
                    &resolved.source_raw_url,
                    token.as_deref(),
                );
                let target = PlaybackTarget {
                    source_url,
                    display_title: resolved.title,
                    content_id: self.request.content_id.clone(),
                    season: resolved.season,
                    episode: resolved.episode,
                };
                info!("Playing {}", target);
                self.target = Some(target);
                self.neighbors = resolved.neighbors;
                self.start_attempt();
            }
            Err(e) => {
                warn!("Could not resolve {}: {}", self.request.content_id, e);
                self.enter_load_error(ErrorInfo::Resolution {
                    message: e.to_string(),
                });
            }
        }
    }

    /// Load the resolved source into the media element
    fn start_attempt(&mut self) {
        let Some(url) = self.target.as_ref().map(|t| t.source_url.clone()) else {
            return;
        };

        self.attempt += 1;
        self.phase = PlaybackPhase::Loading;
        self.state = PlaybackState {
            fullscreen: self.state.fullscreen,
            ..PlaybackState::default()
        };
        self.pin_controls();

        let sink = MediaEventSink::new(self.attempt, self.events_tx.clone());
        if let Err(e) = self.media.load(&url, sink) {
            warn!("Media load failed: {}", e);
            self.enter_load_error(e.into());
            return;
        }
        self.arm_checkpoint();
    }

    /// Retry after a failure: re-resolve if nothing was resolved, else reload
    pub fn retry(&mut self) {
        if self.closed || self.phase != PlaybackPhase::LoadError {
            return;
        }
        if self.target.is_some() {
            self.reload();
        } else {
            self.start();
        }
    }

    /// Reload the already-resolved source after a media error
    pub fn reload(&mut self) {
        if self.closed || self.phase != PlaybackPhase::LoadError || self.target.is_none() {
            debug!("Reload ignored in {:?}", self.phase);
            return;
        }
        info!("Reloading {}", self.title());
        self.start_attempt();
    }

    /// Replace the target with another episode of the same content
    pub fn switch_episode(&mut self, season: u32, episode: u32) {
        if self.closed {
            return;
        }

        self.final_checkpoint();
        self.checkpoint_timer = None;
        // Invalidate listeners bound to the old source
        self.attempt += 1;
        self.target = None;
        self.neighbors = EpisodeNeighbors::default();
        self.state = PlaybackState {
            fullscreen: self.state.fullscreen,
            ..PlaybackState::default()
        };
        self.request = self
            .request
            .clone()
            .with_episode(Some(season), Some(episode));
        self.start();
    }

    /// Move to the following episode, if the series has one
    pub fn next_episode(&mut self) {
        match self.neighbors.next {
            Some((season, episode)) => self.switch_episode(season, episode),
            None => debug!("No episode after {}", self.title()),
        }
    }

    /// Move to the preceding episode, if there is one
    pub fn previous_episode(&mut self) {
        match self.neighbors.previous {
            Some((season, episode)) => self.switch_episode(season, episode),
            None => debug!("No episode before {}", self.title()),
        }
    }

    /// Tear the session down: stop timers, save a last checkpoint, detach media.
    ///
    /// Waits at most `final_write_timeout` for outstanding progress writes.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        self.checkpoint_timer = None;
        self.resolving = None;
        self.pin_controls();

        self.final_checkpoint();
        self.media.detach();

        let pending = std::mem::take(&mut self.pending_writes);
        let drain = async {
            for handle in pending {
                let _ = handle.await;
            }
        };
        if time::timeout(self.config.final_write_timeout, drain).await.is_err() {
            warn!("Progress writes still pending at close");
        }
        info!("Closed session for {}", self.request.content_id);
    }

    /// Wait for spawned progress writes to finish
    pub async fn flush_pending_writes(&mut self) {
        for handle in std::mem::take(&mut self.pending_writes) {
            let _ = handle.await;
        }
    }

    // -------------------------------------------------------------------------
    // Media events
    // -------------------------------------------------------------------------

    fn on_media(&mut self, attempt: u64, event: MediaEvent) {
        if attempt != self.attempt {
            debug!("Dropping event from attempt {}: {:?}", attempt, event);
            return;
        }

        match (self.phase, &event) {
            (PlaybackPhase::LoadError, _) => return,
            (_, MediaEvent::TimeUpdate { position }) => {
                self.state.current_time_seconds = position.max(0.0);
                return;
            }
            // Autoplay can start before metadata is known
            (PlaybackPhase::Loading, MediaEvent::Play) => {
                self.state.is_playing = true;
                return;
            }
            (PlaybackPhase::Loading, MediaEvent::Pause) => {
                self.state.is_playing = false;
                return;
            }
            // A later duration keeps the phase and only rescales the timeline
            (phase, MediaEvent::MetadataLoaded { duration }) if phase.has_media() => {
                self.set_duration(*duration);
                return;
            }
            _ => {}
        }

        let Some(next) = next_phase(self.phase, &event) else {
            debug!("Ignoring {:?} in {:?}", event, self.phase);
            return;
        };
        debug!("{:?} -> {:?}", self.phase, next);
        self.phase = next;

        match event {
            MediaEvent::MetadataLoaded { duration } => {
                self.set_duration(duration);
                self.on_ready();
            }
            MediaEvent::Play => self.on_playing(),
            MediaEvent::Pause => {
                self.state.is_playing = false;
                self.pin_controls();
            }
            MediaEvent::Ended => self.on_ended(),
            MediaEvent::Error(e) => {
                warn!("Media error: {}", e);
                self.enter_load_error(e.into());
            }
            MediaEvent::TimeUpdate { .. } => {}
        }
    }

    fn set_duration(&mut self, duration: f64) {
        self.state.duration_seconds = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        self.state.current_time_seconds =
            clamp_position(self.state.current_time_seconds, self.state.duration_seconds);
    }

    fn on_ready(&mut self) {
        self.restore_position();
        if self.state.is_playing {
            self.phase = PlaybackPhase::Playing;
            self.on_playing();
        } else {
            self.pin_controls();
        }
    }

    /// Seek to the saved position unless it is empty or near the end
    fn restore_position(&mut self) {
        let Some(content_id) = self.target.as_ref().map(|t| t.content_id.clone()) else {
            return;
        };
        let Some(saved) = self.deps.progress.read_local(&content_id) else {
            return;
        };

        let saved = saved as f64;
        let limit = self.state.duration_seconds * self.config.resume_threshold;
        if saved <= 0.0 || saved >= limit {
            debug!("Not resuming {} at {}s (limit {}s)", content_id, saved, limit);
            return;
        }

        match self.media.seek(saved) {
            Ok(()) => {
                info!("Resuming {} at {}s", content_id, saved);
                self.state.current_time_seconds = saved;
                self.notices
                    .push(Notice::new(RESUME_NOTICE, self.config.notice_duration));
            }
            Err(e) => warn!("Resume seek failed: {}", e),
        }
    }

    fn on_playing(&mut self) {
        self.state.is_playing = true;
        self.show_controls();
    }

    fn on_ended(&mut self) {
        self.state.is_playing = false;
        if self.state.duration_seconds > 0.0 {
            self.state.current_time_seconds = self.state.duration_seconds;
        }
        self.pin_controls();

        let Some(content_id) = self.target.as_ref().map(|t| t.content_id.clone()) else {
            return;
        };
        self.deps.progress.clear_local(&content_id);

        let progress = self.deps.progress.clone();
        self.track(tokio::spawn(async move {
            match progress.mark_watched(&content_id).await {
                Ok(()) => info!("Marked {} as watched", content_id),
                Err(e) => warn!("Mark watched for {} failed: {}", content_id, e),
            }
        }));
    }

    fn enter_load_error(&mut self, error: ErrorInfo) {
        self.phase = PlaybackPhase::LoadError;
        self.state.is_playing = false;
        self.state.load_error = Some(error);
        self.pin_controls();
    }

    /// Route a media command failure into the state machine
    fn command(&mut self, result: Result<(), MediaError>) {
        if let Err(e) = result {
            warn!("Media command failed: {}", e);
            if self.phase != PlaybackPhase::LoadError {
                self.enter_load_error(e.into());
            }
        }
    }

    // -------------------------------------------------------------------------
    // User actions
    // -------------------------------------------------------------------------

    async fn on_user(&mut self, action: UserAction) {
        match action {
            UserAction::Close => self.close().await,
            UserAction::Retry => self.retry(),
            UserAction::NextEpisode => self.next_episode(),
            UserAction::PreviousEpisode => self.previous_episode(),
            UserAction::Activity => self.register_activity(),
            UserAction::TogglePlayPause => {
                self.register_activity();
                self.toggle_play_pause();
            }
            UserAction::SeekTo(position) => {
                self.register_activity();
                self.seek_to(position);
            }
            UserAction::SkipForward => {
                self.register_activity();
                self.skip_forward();
            }
            UserAction::SkipBackward => {
                self.register_activity();
                self.skip_backward();
            }
            UserAction::ToggleFullscreen => {
                self.register_activity();
                self.toggle_fullscreen();
            }
        }
    }

    pub fn toggle_play_pause(&mut self) {
        let result = match self.phase {
            PlaybackPhase::Playing => self.media.pause(),
            PlaybackPhase::Ready | PlaybackPhase::Paused => self.media.play(),
            PlaybackPhase::Ended => {
                // Playing an ended element restarts it from the top
                if self.state.current_time_seconds >= self.state.duration_seconds {
                    self.state.current_time_seconds = 0.0;
                    if let Err(e) = self.media.seek(0.0) {
                        self.command(Err(e));
                        return;
                    }
                }
                self.media.play()
            }
            PlaybackPhase::Loading | PlaybackPhase::LoadError => return,
        };
        self.command(result);
    }

    /// Seek to `position`, clamped into `[0, duration]`
    pub fn seek_to(&mut self, position: f64) {
        if !self.phase.has_media() || self.state.duration_seconds <= 0.0 {
            return;
        }
        let position = clamp_position(position, self.state.duration_seconds);
        self.state.current_time_seconds = position;
        let result = self.media.seek(position);
        self.command(result);
    }

    pub fn skip_forward(&mut self) {
        self.seek_to(self.state.current_time_seconds + self.config.skip_seconds);
    }

    pub fn skip_backward(&mut self) {
        self.seek_to(self.state.current_time_seconds - self.config.skip_seconds);
    }

    pub fn toggle_fullscreen(&mut self) {
        let fullscreen = !self.state.fullscreen;
        match self.media.set_fullscreen(fullscreen) {
            Ok(()) => self.state.fullscreen = fullscreen,
            Err(e) => warn!("Fullscreen toggle failed: {}", e),
        }
    }

    // -------------------------------------------------------------------------
    // Controls visibility
    // -------------------------------------------------------------------------

    /// Pointer or touch activity: show the controls and restart the idle window
    pub fn register_activity(&mut self) {
        if self.phase == PlaybackPhase::Playing {
            self.show_controls();
        } else {
            self.pin_controls();
        }
    }

    /// Show the controls and arm a fresh idle timer
    fn show_controls(&mut self) {
        // Drop the previous timer before arming the next
        self.set_controls(Controls::Pinned);

        self.idle_generation += 1;
        let generation = self.idle_generation;
        let tx = self.events_tx.clone();
        let timer = ScheduledTask::after(self.config.idle_timeout, move || {
            let _ = tx.send(SessionEvent::IdleElapsed { generation });
        });
        self.set_controls(Controls::Shown {
            generation,
            _timer: timer,
        });
    }

    fn pin_controls(&mut self) {
        self.idle_generation += 1;
        self.set_controls(Controls::Pinned);
    }

    fn set_controls(&mut self, controls: Controls) {
        self.state.controls_visible = !matches!(controls, Controls::Hidden);
        self.controls = controls;
    }

    fn on_idle_elapsed(&mut self, generation: u64) {
        let current = matches!(
            self.controls,
            Controls::Shown { generation: g, .. } if g == generation
        );
        if current && self.phase == PlaybackPhase::Playing {
            self.set_controls(Controls::Hidden);
        }
    }

    // -------------------------------------------------------------------------
    // Progress checkpointing
    // -------------------------------------------------------------------------

    fn arm_checkpoint(&mut self) {
        if self.checkpoint_timer.is_some() {
            return;
        }
        if !self.deps.session.is_authenticated() {
            debug!("Not logged in; progress checkpoints disabled");
            return;
        }

        let tx = self.events_tx.clone();
        self.checkpoint_timer = Some(ScheduledTask::every(
            self.config.checkpoint_interval,
            move || tx.send(SessionEvent::CheckpointTick).is_ok(),
        ));
    }

    /// Last save before the source goes away
    fn final_checkpoint(&mut self) {
        if self.phase == PlaybackPhase::Ended || !self.deps.session.is_authenticated() {
            return;
        }
        self.save_checkpoint();
    }

    /// Periodic checkpoint; nothing to save once the content has ended
    fn checkpoint(&mut self) {
        if self.phase == PlaybackPhase::Ended {
            return;
        }
        self.save_checkpoint();
    }

    /// Write the current position locally, then remotely in the background
    fn save_checkpoint(&mut self) {
        let Some(record) = self.checkpoint_record() else {
            return;
        };

        self.deps
            .progress
            .write_local(&record.content_id, record.elapsed_seconds);

        let progress = self.deps.progress.clone();
        self.track(tokio::spawn(async move {
            if let Err(e) = progress.write_remote(&record).await {
                warn!("Remote checkpoint for {} failed: {}", record.content_id, e);
            }
        }));
    }

    fn checkpoint_record(&self) -> Option<ProgressRecord> {
        let target = self.target.as_ref()?;
        if self.state.current_time_seconds <= 0.0 {
            return None;
        }
        let elapsed = self.state.current_time_seconds.floor() as u64;
        Some(ProgressRecord::new(&target.content_id, elapsed).with_episode(target.season, target.episode))
    }

    fn track(&mut self, handle: JoinHandle<()>) {
        self.pending_writes.retain(|h| !h.is_finished());
        self.pending_writes.push(handle);
    }
}
