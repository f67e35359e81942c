//! Media element abstraction
//!
//! The playback session drives a [`MediaElement`] with commands and learns
//! what actually happened only through [`MediaEvent`]s delivered on the
//! session's event channel.

use thiserror::Error;
use tokio::sync::mpsc;

use crate::models::{ErrorInfo, MediaErrorKind};
use crate::stream::session::SessionEvent;

/// Lifecycle events raised by a media element
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    /// Duration is known; the element can seek
    MetadataLoaded { duration: f64 },
    /// Playback position moved
    TimeUpdate { position: f64 },
    Play,
    Pause,
    /// Natural end of media
    Ended,
    Error(MediaError),
}

/// Failure raised by the media element
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct MediaError {
    pub kind: MediaErrorKind,
    pub message: String,
}

impl MediaError {
    pub fn new(kind: MediaErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<MediaError> for ErrorInfo {
    fn from(e: MediaError) -> Self {
        ErrorInfo::Media {
            kind: e.kind,
            message: e.message,
        }
    }
}

/// Where a media element delivers its events.
///
/// Each sink is bound to one load attempt; the session ignores events from a
/// sink whose attempt is no longer current.
#[derive(Debug, Clone)]
pub struct MediaEventSink {
    attempt: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl MediaEventSink {
    pub(crate) fn new(attempt: u64, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { attempt, tx }
    }

    pub fn attempt(&self) -> u64 {
        self.attempt
    }

    /// Deliver an event; returns false once the session is gone
    pub fn emit(&self, event: MediaEvent) -> bool {
        self.tx
            .send(SessionEvent::Media {
                attempt: self.attempt,
                event,
            })
            .is_ok()
    }
}

/// A controllable media element.
///
/// Commands must not block; results arrive later as events.
pub trait MediaElement: Send {
    /// Attach `events`, load `url` and start playing once possible
    fn load(&mut self, url: &str, events: MediaEventSink) -> Result<(), MediaError>;

    fn play(&mut self) -> Result<(), MediaError>;

    fn pause(&mut self) -> Result<(), MediaError>;

    /// Jump to an absolute position in seconds
    fn seek(&mut self, position: f64) -> Result<(), MediaError>;

    fn set_fullscreen(&mut self, fullscreen: bool) -> Result<(), MediaError>;

    /// Stop playback and drop the attached sink
    fn detach(&mut self);
}
