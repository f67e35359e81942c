//! Playback session tests
//!
//! Drives a PlaybackSession against in-memory fakes under paused tokio time:
//! resolution, resume, seeking, controls auto-hide, checkpointing, close and
//! episode switching.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::time::{self, Duration};

use streamify::models::{ErrorInfo, MediaErrorKind, PlaybackPhase, ProgressRecord};
use streamify::stream::session::RESUME_NOTICE;
use streamify::stream::{
    Collaborators, ContentRequest, ContentResolver, EpisodeNeighbors, MediaElement, MediaError,
    MediaEvent, MediaEventSink, PersistenceError, PlaybackSession, ProgressStore, ResolutionError,
    ResolvedContent, SessionConfig, SessionEvent, SessionProvider, UserAction,
};

const PROXY: &str = "https://proxy.test/api/download?url=";
const WEB: &str = "https://web.test";

// =============================================================================
// Fakes
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Load(String),
    Play,
    Pause,
    Seek(f64),
    Fullscreen(bool),
    Detach,
}

/// Media element that records commands; the test plays the media's part
#[derive(Clone, Default)]
struct FakeMedia {
    calls: Arc<Mutex<Vec<Call>>>,
    sink: Arc<Mutex<Option<MediaEventSink>>>,
    fail_fullscreen: bool,
}

impl FakeMedia {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn loads(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Load(url) => Some(url),
                _ => None,
            })
            .collect()
    }

    fn sink(&self) -> MediaEventSink {
        self.sink.lock().unwrap().clone().expect("media was never loaded")
    }

    fn emit(&self, event: MediaEvent) {
        self.sink().emit(event);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl MediaElement for FakeMedia {
    fn load(&mut self, url: &str, events: MediaEventSink) -> Result<(), MediaError> {
        self.record(Call::Load(url.to_string()));
        *self.sink.lock().unwrap() = Some(events);
        Ok(())
    }

    fn play(&mut self) -> Result<(), MediaError> {
        self.record(Call::Play);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), MediaError> {
        self.record(Call::Pause);
        Ok(())
    }

    fn seek(&mut self, position: f64) -> Result<(), MediaError> {
        self.record(Call::Seek(position));
        Ok(())
    }

    fn set_fullscreen(&mut self, fullscreen: bool) -> Result<(), MediaError> {
        if self.fail_fullscreen {
            return Err(MediaError::new(MediaErrorKind::Aborted, "no window"));
        }
        self.record(Call::Fullscreen(fullscreen));
        Ok(())
    }

    fn detach(&mut self) {
        self.record(Call::Detach);
    }
}

struct FakeResolver {
    result: Mutex<Result<ResolvedContent, ResolutionError>>,
    requests: Mutex<Vec<ContentRequest>>,
}

impl FakeResolver {
    fn new(result: Result<ResolvedContent, ResolutionError>) -> Self {
        Self {
            result: Mutex::new(result),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn set(&self, result: Result<ResolvedContent, ResolutionError>) {
        *self.result.lock().unwrap() = result;
    }

    fn requests(&self) -> Vec<ContentRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContentResolver for FakeResolver {
    async fn resolve(&self, request: &ContentRequest) -> Result<ResolvedContent, ResolutionError> {
        self.requests.lock().unwrap().push(request.clone());
        self.result.lock().unwrap().clone()
    }
}

#[derive(Default)]
struct FakeProgress {
    local: Mutex<HashMap<String, u64>>,
    remote: Mutex<Vec<ProgressRecord>>,
    watched: Mutex<Vec<String>>,
    fail_remote: bool,
}

impl FakeProgress {
    fn local(&self, id: &str) -> Option<u64> {
        self.local.lock().unwrap().get(id).copied()
    }

    fn remote(&self) -> Vec<ProgressRecord> {
        self.remote.lock().unwrap().clone()
    }

    fn watched(&self) -> Vec<String> {
        self.watched.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProgressStore for FakeProgress {
    fn read_local(&self, content_id: &str) -> Option<u64> {
        self.local(content_id)
    }

    fn write_local(&self, content_id: &str, elapsed_seconds: u64) {
        self.local
            .lock()
            .unwrap()
            .insert(content_id.to_string(), elapsed_seconds);
    }

    fn clear_local(&self, content_id: &str) {
        self.local.lock().unwrap().remove(content_id);
    }

    async fn write_remote(&self, record: &ProgressRecord) -> Result<(), PersistenceError> {
        if self.fail_remote {
            return Err(PersistenceError::Unauthenticated);
        }
        self.remote.lock().unwrap().push(record.clone());
        Ok(())
    }

    async fn mark_watched(&self, content_id: &str) -> Result<(), PersistenceError> {
        self.watched.lock().unwrap().push(content_id.to_string());
        Ok(())
    }
}

struct FakeSession(Option<String>);

impl SessionProvider for FakeSession {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    session: PlaybackSession<FakeMedia>,
    media: FakeMedia,
    resolver: Arc<FakeResolver>,
    progress: Arc<FakeProgress>,
}

fn episode() -> ResolvedContent {
    ResolvedContent {
        title: "Show - T1E3".into(),
        source_raw_url: "https://cdn/x.m3u8".into(),
        season: Some(1),
        episode: Some(3),
        neighbors: EpisodeNeighbors {
            previous: Some((1, 2)),
            next: Some((1, 4)),
        },
    }
}

fn fourth_episode() -> ResolvedContent {
    ResolvedContent {
        title: "Show - T1E4".into(),
        source_raw_url: "https://cdn/y.m3u8".into(),
        season: Some(1),
        episode: Some(4),
        neighbors: EpisodeNeighbors {
            previous: Some((1, 3)),
            next: None,
        },
    }
}

fn build(
    token: Option<&str>,
    resolved: Result<ResolvedContent, ResolutionError>,
    media: FakeMedia,
    progress: FakeProgress,
) -> Harness {
    let resolver = Arc::new(FakeResolver::new(resolved));
    let progress = Arc::new(progress);
    let deps = Collaborators {
        resolver: resolver.clone(),
        progress: progress.clone(),
        session: Arc::new(FakeSession(token.map(String::from))),
    };
    let config = SessionConfig {
        proxy_base_url: PROXY.into(),
        web_base_url: WEB.into(),
        ..SessionConfig::default()
    };
    let request = ContentRequest::new("42")
        .unwrap()
        .with_episode(Some(1), Some(3));

    Harness {
        session: PlaybackSession::new(request, media.clone(), deps, config),
        media,
        resolver,
        progress,
    }
}

fn harness() -> Harness {
    build(Some("tok"), Ok(episode()), FakeMedia::default(), FakeProgress::default())
}

fn with_saved_position(seconds: u64) -> Harness {
    let progress = FakeProgress::default();
    progress.write_local("42", seconds);
    build(Some("tok"), Ok(episode()), FakeMedia::default(), progress)
}

/// Let spawned tasks run, then handle everything queued
async fn drain(session: &mut PlaybackSession<FakeMedia>) {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    while let Some(event) = session.try_next_event() {
        session.dispatch(event).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }
}

async fn elapse(session: &mut PlaybackSession<FakeMedia>, duration: Duration) {
    time::advance(duration).await;
    drain(session).await;
}

async fn user(session: &mut PlaybackSession<FakeMedia>, action: UserAction) {
    session.dispatch(SessionEvent::User(action)).await;
    drain(session).await;
}

/// Resolve, load metadata and start playing
async fn start_playing(h: &mut Harness, duration: f64) {
    h.session.start();
    drain(&mut h.session).await;
    h.media.emit(MediaEvent::MetadataLoaded { duration });
    h.media.emit(MediaEvent::Play);
    drain(&mut h.session).await;
    assert_eq!(h.session.phase(), PlaybackPhase::Playing);
}

// =============================================================================
// Resolution
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_resolution_failure_enters_load_error() {
    let mut h = build(
        Some("tok"),
        Err(ResolutionError::ContentNotFound("42".into())),
        FakeMedia::default(),
        FakeProgress::default(),
    );

    h.session.start();
    assert_eq!(h.session.phase(), PlaybackPhase::Loading);
    drain(&mut h.session).await;

    assert_eq!(h.session.phase(), PlaybackPhase::LoadError);
    assert!(matches!(
        h.session.state().load_error,
        Some(ErrorInfo::Resolution { .. })
    ));
    assert!(h.media.calls().is_empty());
    assert!(!h.session.is_checkpointing());
    assert!(h.session.state().controls_visible);
    assert_eq!(h.session.fallback_url(), "https://web.test/conteudo/42");
}

#[tokio::test(start_paused = true)]
async fn test_resolved_source_is_proxied_with_token() {
    let mut h = harness();
    h.session.start();
    drain(&mut h.session).await;

    assert_eq!(
        h.media.loads(),
        vec!["https://proxy.test/api/download?url=https%3A%2F%2Fcdn%2Fx.m3u8&token=tok".to_string()]
    );
    assert_eq!(h.session.title(), "Show - T1E3");
    let target = h.session.target().unwrap();
    assert_eq!(target.content_id, "42");
    assert_eq!(target.season, Some(1));
    assert_eq!(target.episode, Some(3));
    assert_eq!(h.session.fallback_url(), target.source_url);
}

#[tokio::test(start_paused = true)]
async fn test_retry_after_resolution_failure_resolves_again() {
    let mut h = build(
        Some("tok"),
        Err(ResolutionError::Request("timeout".into())),
        FakeMedia::default(),
        FakeProgress::default(),
    );
    h.session.start();
    drain(&mut h.session).await;
    assert_eq!(h.session.phase(), PlaybackPhase::LoadError);

    h.resolver.set(Ok(episode()));
    user(&mut h.session, UserAction::Retry).await;

    assert_eq!(h.resolver.requests().len(), 2);
    assert_eq!(h.session.phase(), PlaybackPhase::Loading);
    assert_eq!(h.media.loads().len(), 1);
    assert!(h.session.state().load_error.is_none());
}

// =============================================================================
// Resume
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_resume_restores_saved_position() {
    let mut h = with_saved_position(120);
    h.session.start();
    drain(&mut h.session).await;

    h.media.emit(MediaEvent::MetadataLoaded { duration: 1000.0 });
    drain(&mut h.session).await;

    assert_eq!(h.session.phase(), PlaybackPhase::Ready);
    assert!(h.media.calls().contains(&Call::Seek(120.0)));
    assert_eq!(h.session.state().current_time_seconds, 120.0);

    let notices = h.session.take_notices();
    assert_eq!(notices.len(), 1);
    assert_eq!(notices[0].message, RESUME_NOTICE);
    assert!(h.session.take_notices().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_resume_skipped_near_the_end() {
    let mut h = with_saved_position(960);
    h.session.start();
    drain(&mut h.session).await;

    h.media.emit(MediaEvent::MetadataLoaded { duration: 1000.0 });
    drain(&mut h.session).await;

    assert!(!h.media.calls().iter().any(|c| matches!(c, Call::Seek(_))));
    assert_eq!(h.session.state().current_time_seconds, 0.0);
    assert!(h.session.take_notices().is_empty());
}

/// Saved position `saved` against a 1000 s duration; returns whether it seeked
async fn resumes_at(saved: u64) -> bool {
    let mut h = with_saved_position(saved);
    h.session.start();
    drain(&mut h.session).await;
    h.media.emit(MediaEvent::MetadataLoaded { duration: 1000.0 });
    drain(&mut h.session).await;

    assert_eq!(h.session.phase(), PlaybackPhase::Ready);
    let seeked = h.media.calls().iter().any(|c| matches!(c, Call::Seek(_)));
    assert_eq!(seeked, !h.session.take_notices().is_empty());
    seeked
}

#[tokio::test(start_paused = true)]
async fn test_resume_threshold_boundary() {
    assert!(resumes_at(949).await);
    assert!(!resumes_at(950).await);
}

#[tokio::test(start_paused = true)]
async fn test_resume_skipped_for_zero_position() {
    assert!(!resumes_at(0).await);
    assert!(resumes_at(1).await);
}

#[tokio::test(start_paused = true)]
async fn test_autoplay_before_metadata_goes_straight_to_playing() {
    let mut h = harness();
    h.session.start();
    drain(&mut h.session).await;

    h.media.emit(MediaEvent::Play);
    drain(&mut h.session).await;
    assert_eq!(h.session.phase(), PlaybackPhase::Loading);

    h.media.emit(MediaEvent::MetadataLoaded { duration: 600.0 });
    drain(&mut h.session).await;
    assert_eq!(h.session.phase(), PlaybackPhase::Playing);
    assert!(h.session.state().is_playing);
}

// =============================================================================
// Controls
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_toggle_play_pause() {
    let mut h = harness();
    start_playing(&mut h, 600.0).await;

    user(&mut h.session, UserAction::TogglePlayPause).await;
    assert_eq!(h.media.calls().last(), Some(&Call::Pause));

    h.media.emit(MediaEvent::Pause);
    drain(&mut h.session).await;
    assert_eq!(h.session.phase(), PlaybackPhase::Paused);
    assert!(!h.session.state().is_playing);

    user(&mut h.session, UserAction::TogglePlayPause).await;
    assert_eq!(h.media.calls().last(), Some(&Call::Play));
}

#[tokio::test(start_paused = true)]
async fn test_skips_saturate_at_both_ends() {
    let mut h = harness();
    start_playing(&mut h, 100.0).await;

    user(&mut h.session, UserAction::SeekTo(95.0)).await;
    user(&mut h.session, UserAction::SkipForward).await;
    assert_eq!(h.session.state().current_time_seconds, 100.0);
    assert_eq!(h.media.calls().last(), Some(&Call::Seek(100.0)));

    user(&mut h.session, UserAction::SeekTo(5.0)).await;
    user(&mut h.session, UserAction::SkipBackward).await;
    assert_eq!(h.session.state().current_time_seconds, 0.0);
    assert_eq!(h.media.calls().last(), Some(&Call::Seek(0.0)));
}

#[tokio::test(start_paused = true)]
async fn test_seek_ignored_while_loading() {
    let mut h = harness();
    h.session.start();
    drain(&mut h.session).await;

    user(&mut h.session, UserAction::SeekTo(30.0)).await;
    assert!(!h.media.calls().iter().any(|c| matches!(c, Call::Seek(_))));
}

#[tokio::test(start_paused = true)]
async fn test_fullscreen_toggle_and_failure() {
    let mut h = harness();
    start_playing(&mut h, 100.0).await;
    user(&mut h.session, UserAction::ToggleFullscreen).await;
    assert!(h.session.state().fullscreen);
    assert_eq!(h.media.calls().last(), Some(&Call::Fullscreen(true)));

    let media = FakeMedia {
        fail_fullscreen: true,
        ..FakeMedia::default()
    };
    let mut h = build(Some("tok"), Ok(episode()), media, FakeProgress::default());
    start_playing(&mut h, 100.0).await;
    user(&mut h.session, UserAction::ToggleFullscreen).await;
    assert!(!h.session.state().fullscreen);
    assert_eq!(h.session.phase(), PlaybackPhase::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_controls_hide_after_idle_timeout() {
    let mut h = harness();
    start_playing(&mut h, 600.0).await;
    assert!(h.session.state().controls_visible);

    elapse(&mut h.session, Duration::from_millis(2999)).await;
    assert!(h.session.state().controls_visible);

    elapse(&mut h.session, Duration::from_millis(1)).await;
    assert!(!h.session.state().controls_visible);
}

#[tokio::test(start_paused = true)]
async fn test_activity_restarts_idle_window() {
    let mut h = harness();
    start_playing(&mut h, 600.0).await;

    elapse(&mut h.session, Duration::from_millis(2000)).await;
    user(&mut h.session, UserAction::Activity).await;

    elapse(&mut h.session, Duration::from_millis(2000)).await;
    assert!(h.session.state().controls_visible);

    elapse(&mut h.session, Duration::from_millis(1000)).await;
    assert!(!h.session.state().controls_visible);

    user(&mut h.session, UserAction::Activity).await;
    assert!(h.session.state().controls_visible);
}

#[tokio::test(start_paused = true)]
async fn test_controls_stay_visible_while_paused() {
    let mut h = harness();
    start_playing(&mut h, 600.0).await;

    h.media.emit(MediaEvent::Pause);
    drain(&mut h.session).await;
    elapse(&mut h.session, Duration::from_secs(10)).await;

    assert_eq!(h.session.phase(), PlaybackPhase::Paused);
    assert!(h.session.state().controls_visible);
}

// =============================================================================
// Checkpointing
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_checkpoint_every_thirty_seconds() {
    let mut h = harness();
    start_playing(&mut h, 600.0).await;
    assert!(h.session.is_checkpointing());

    h.media.emit(MediaEvent::TimeUpdate { position: 42.7 });
    elapse(&mut h.session, Duration::from_secs(29)).await;
    assert!(h.progress.remote().is_empty());

    elapse(&mut h.session, Duration::from_secs(1)).await;
    assert_eq!(h.progress.local("42"), Some(42));
    let expected = ProgressRecord::new("42", 42).with_episode(Some(1), Some(3));
    assert_eq!(h.progress.remote(), vec![expected]);

    h.media.emit(MediaEvent::TimeUpdate { position: 71.0 });
    elapse(&mut h.session, Duration::from_secs(30)).await;
    assert_eq!(h.progress.local("42"), Some(71));
    assert_eq!(h.progress.remote().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_no_checkpoint_at_zero() {
    let mut h = harness();
    start_playing(&mut h, 600.0).await;

    elapse(&mut h.session, Duration::from_secs(30)).await;
    assert_eq!(h.progress.local("42"), None);
    assert!(h.progress.remote().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unauthenticated_session_never_checkpoints() {
    let mut h = build(None, Ok(episode()), FakeMedia::default(), FakeProgress::default());
    start_playing(&mut h, 600.0).await;
    assert!(!h.session.is_checkpointing());
    assert_eq!(
        h.media.loads(),
        vec!["https://proxy.test/api/download?url=https%3A%2F%2Fcdn%2Fx.m3u8".to_string()]
    );

    h.media.emit(MediaEvent::TimeUpdate { position: 50.0 });
    elapse(&mut h.session, Duration::from_secs(60)).await;
    user(&mut h.session, UserAction::Close).await;

    assert_eq!(h.progress.local("42"), None);
    assert!(h.progress.remote().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_remote_failure_keeps_local_and_playback() {
    let progress = FakeProgress {
        fail_remote: true,
        ..FakeProgress::default()
    };
    let mut h = build(Some("tok"), Ok(episode()), FakeMedia::default(), progress);
    start_playing(&mut h, 600.0).await;

    h.media.emit(MediaEvent::TimeUpdate { position: 10.0 });
    elapse(&mut h.session, Duration::from_secs(30)).await;

    assert_eq!(h.progress.local("42"), Some(10));
    assert_eq!(h.session.phase(), PlaybackPhase::Playing);
    assert!(h.session.state().load_error.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_ended_clears_local_and_marks_watched() {
    let mut h = with_saved_position(50);
    start_playing(&mut h, 600.0).await;

    h.media.emit(MediaEvent::Ended);
    drain(&mut h.session).await;

    assert_eq!(h.session.phase(), PlaybackPhase::Ended);
    assert_eq!(h.progress.local("42"), None);
    assert_eq!(h.progress.watched(), vec!["42".to_string()]);
    assert_eq!(h.session.state().current_time_seconds, 600.0);
    assert!(h.session.state().controls_visible);

    // Nothing to checkpoint after the end
    elapse(&mut h.session, Duration::from_secs(30)).await;
    assert_eq!(h.progress.local("42"), None);
    assert!(h.progress.remote().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_play_after_end_restarts_from_zero() {
    let mut h = harness();
    start_playing(&mut h, 300.0).await;
    h.media.emit(MediaEvent::Ended);
    drain(&mut h.session).await;

    user(&mut h.session, UserAction::TogglePlayPause).await;
    let calls = h.media.calls();
    assert_eq!(&calls[calls.len() - 2..], &[Call::Seek(0.0), Call::Play]);

    h.media.emit(MediaEvent::Play);
    drain(&mut h.session).await;
    assert_eq!(h.session.phase(), PlaybackPhase::Playing);
}

// =============================================================================
// Close
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_close_writes_final_checkpoint_and_detaches() {
    let mut h = harness();
    start_playing(&mut h, 600.0).await;
    h.media.emit(MediaEvent::TimeUpdate { position: 77.2 });
    drain(&mut h.session).await;

    user(&mut h.session, UserAction::Close).await;

    assert!(h.session.is_closed());
    assert!(!h.session.is_checkpointing());
    assert_eq!(h.progress.local("42"), Some(77));
    assert_eq!(h.progress.remote().last().map(|r| r.elapsed_seconds), Some(77));
    assert_eq!(h.media.calls().last(), Some(&Call::Detach));

    // Timers are gone and later events are ignored
    elapse(&mut h.session, Duration::from_secs(90)).await;
    assert_eq!(h.progress.remote().len(), 1);
    h.media.emit(MediaEvent::Pause);
    drain(&mut h.session).await;
    assert_eq!(h.session.phase(), PlaybackPhase::Playing);
}

#[tokio::test(start_paused = true)]
async fn test_close_after_end_skips_checkpoint() {
    let mut h = harness();
    start_playing(&mut h, 600.0).await;
    h.media.emit(MediaEvent::Ended);
    drain(&mut h.session).await;

    h.session.close().await;
    assert_eq!(h.progress.local("42"), None);
    assert!(h.progress.remote().is_empty());
}

// =============================================================================
// Reload and episode switching
// =============================================================================

#[tokio::test(start_paused = true)]
async fn test_reload_after_media_error_ignores_stale_attempt() {
    let mut h = harness();
    start_playing(&mut h, 600.0).await;

    h.media.emit(MediaEvent::Error(MediaError::new(
        MediaErrorKind::Network,
        "connection reset",
    )));
    drain(&mut h.session).await;
    assert_eq!(h.session.phase(), PlaybackPhase::LoadError);
    assert!(matches!(
        h.session.state().load_error,
        Some(ErrorInfo::Media {
            kind: MediaErrorKind::Network,
            ..
        })
    ));

    // Events are ignored while in error
    h.media.emit(MediaEvent::Play);
    drain(&mut h.session).await;
    assert_eq!(h.session.phase(), PlaybackPhase::LoadError);

    let stale = h.media.sink();
    user(&mut h.session, UserAction::Retry).await;

    let loads = h.media.loads();
    assert_eq!(loads.len(), 2);
    assert_eq!(loads[0], loads[1]);
    assert_eq!(h.resolver.requests().len(), 1);
    assert_eq!(h.session.phase(), PlaybackPhase::Loading);

    stale.emit(MediaEvent::MetadataLoaded { duration: 600.0 });
    drain(&mut h.session).await;
    assert_eq!(h.session.phase(), PlaybackPhase::Loading);

    h.media.emit(MediaEvent::MetadataLoaded { duration: 600.0 });
    drain(&mut h.session).await;
    assert_eq!(h.session.phase(), PlaybackPhase::Ready);
}

#[tokio::test(start_paused = true)]
async fn test_switch_episode_saves_and_resolves_new_target() {
    let mut h = harness();
    start_playing(&mut h, 600.0).await;
    h.media.emit(MediaEvent::TimeUpdate { position: 30.0 });
    drain(&mut h.session).await;
    let old = h.media.sink();

    h.resolver.set(Ok(fourth_episode()));
    h.session.switch_episode(1, 4);
    assert!(h.session.target().is_none());
    assert_eq!(h.session.phase(), PlaybackPhase::Loading);
    drain(&mut h.session).await;

    let saved = h.progress.remote();
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].elapsed_seconds, 30);
    assert_eq!(saved[0].episode.as_deref(), Some("3"));

    let last_request = h.resolver.requests().pop().unwrap();
    assert_eq!(last_request.episode, Some(4));
    assert_eq!(h.session.title(), "Show - T1E4");
    assert!(h.media.loads().last().unwrap().contains("y.m3u8"));
    assert_eq!(h.session.state().current_time_seconds, 0.0);

    // The old source can no longer move the machine
    old.emit(MediaEvent::MetadataLoaded { duration: 10.0 });
    drain(&mut h.session).await;
    assert_eq!(h.session.phase(), PlaybackPhase::Loading);
}

#[tokio::test(start_paused = true)]
async fn test_unauthenticated_switch_writes_nothing() {
    let mut h = build(None, Ok(episode()), FakeMedia::default(), FakeProgress::default());
    start_playing(&mut h, 600.0).await;
    h.media.emit(MediaEvent::TimeUpdate { position: 40.0 });
    drain(&mut h.session).await;
    assert!(!h.session.is_checkpointing());

    h.resolver.set(Ok(fourth_episode()));
    h.session.switch_episode(1, 4);
    drain(&mut h.session).await;

    assert_eq!(h.progress.local("42"), None);
    assert!(h.progress.remote().is_empty());
    assert_eq!(h.session.title(), "Show - T1E4");
}

#[tokio::test(start_paused = true)]
async fn test_later_duration_rescales_the_timeline() {
    let mut h = harness();
    start_playing(&mut h, 600.0).await;
    h.media.emit(MediaEvent::TimeUpdate { position: 500.0 });
    h.media.emit(MediaEvent::MetadataLoaded { duration: 300.0 });
    drain(&mut h.session).await;

    assert_eq!(h.session.phase(), PlaybackPhase::Playing);
    assert_eq!(h.session.state().duration_seconds, 300.0);
    assert_eq!(h.session.state().current_time_seconds, 300.0);

    user(&mut h.session, UserAction::SeekTo(290.0)).await;
    user(&mut h.session, UserAction::SkipForward).await;
    assert_eq!(h.session.state().current_time_seconds, 300.0);
    assert_eq!(h.media.calls().last(), Some(&Call::Seek(300.0)));
}

#[tokio::test(start_paused = true)]
async fn test_switched_episode_takes_the_newest_duration() {
    let mut h = harness();
    start_playing(&mut h, 600.0).await;

    h.resolver.set(Ok(fourth_episode()));
    h.session.switch_episode(1, 4);
    drain(&mut h.session).await;

    // Duration of the outgoing file first, then the real one
    h.media.emit(MediaEvent::MetadataLoaded { duration: 600.0 });
    h.media.emit(MediaEvent::Play);
    h.media.emit(MediaEvent::MetadataLoaded { duration: 300.0 });
    drain(&mut h.session).await;

    assert_eq!(h.session.phase(), PlaybackPhase::Playing);
    assert_eq!(h.session.state().duration_seconds, 300.0);
    user(&mut h.session, UserAction::SeekTo(290.0)).await;
    user(&mut h.session, UserAction::SkipForward).await;
    assert_eq!(h.session.state().current_time_seconds, 300.0);
}

#[tokio::test(start_paused = true)]
async fn test_next_and_previous_episode_actions() {
    let mut h = harness();
    start_playing(&mut h, 600.0).await;

    h.resolver.set(Ok(fourth_episode()));
    user(&mut h.session, UserAction::NextEpisode).await;
    let request = h.resolver.requests().pop().unwrap();
    assert_eq!((request.season, request.episode), (Some(1), Some(4)));
    assert_eq!(h.session.title(), "Show - T1E4");
    assert_eq!(h.session.neighbors().next, None);

    // Last episode: nothing to move to
    user(&mut h.session, UserAction::NextEpisode).await;
    assert_eq!(h.resolver.requests().len(), 2);

    h.resolver.set(Ok(episode()));
    user(&mut h.session, UserAction::PreviousEpisode).await;
    let request = h.resolver.requests().pop().unwrap();
    assert_eq!((request.season, request.episode), (Some(1), Some(3)));
    assert_eq!(h.session.title(), "Show - T1E3");
}

#[tokio::test(start_paused = true)]
async fn test_episode_actions_ignored_for_movies() {
    let movie = ResolvedContent {
        title: "Film".into(),
        source_raw_url: "https://cdn/film.mp4".into(),
        season: None,
        episode: None,
        neighbors: EpisodeNeighbors::default(),
    };
    let mut h = build(Some("tok"), Ok(movie), FakeMedia::default(), FakeProgress::default());
    start_playing(&mut h, 600.0).await;

    user(&mut h.session, UserAction::NextEpisode).await;
    user(&mut h.session, UserAction::PreviousEpisode).await;

    assert_eq!(h.resolver.requests().len(), 1);
    assert_eq!(h.session.phase(), PlaybackPhase::Playing);
}
