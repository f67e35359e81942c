//! Playback infrastructure
//!
//! - Storage: on-disk key/value store holding the session token and resume positions
//! - Resolver: content id to playable source
//! - Progress: local and remote watch-progress persistence
//! - Media: media element abstraction, with an mpv backend
//! - Session: the playback state machine tying it together

pub mod media;
pub mod mpv;
pub mod progress;
pub mod resolver;
pub mod session;
pub mod source;
pub mod storage;
pub mod timer;

pub use media::{MediaElement, MediaError, MediaEvent, MediaEventSink};
pub use mpv::{MpvElement, PlayerError};
pub use progress::{PersistenceError, ProgressStore, SyncedProgressStore};
pub use resolver::{
    ApiResolver, ContentRequest, ContentResolver, EpisodeNeighbors, ResolutionError, ResolvedContent,
};
pub use session::{
    Collaborators, PlaybackSession, SessionConfig, SessionEvent, UserAction,
};
pub use source::compose_source_url;
pub use storage::{LocalStore, SessionProvider, StorageError};
