//! Watch-progress persistence
//!
//! Two copies of every checkpoint: a local one for same-device resume and a
//! remote one for cross-device resume. The local copy is written first and is
//! authoritative for resume; remote failures are returned to the caller, who
//! logs and drops them.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::api::{ApiError, StreamHiveClient};
use crate::models::ProgressRecord;
use crate::stream::storage::{LocalStore, SessionProvider, StorageError};

/// Prefix of local resume-position keys
pub const POSITION_KEY_PREFIX: &str = "watch_position_";

/// Local resume key for a content id
pub fn position_key(content_id: &str) -> String {
    format!("{}{}", POSITION_KEY_PREFIX, content_id)
}

/// Progress read/write failure; never shown to the user
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("Local storage failed: {0}")]
    Local(#[from] StorageError),

    #[error("Remote write failed: {0}")]
    Remote(#[from] ApiError),

    #[error("Not logged in")]
    Unauthenticated,
}

/// Where the playback session saves and restores progress
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// Saved local position in whole seconds
    fn read_local(&self, content_id: &str) -> Option<u64>;

    /// Save a local position; failures are logged, never returned
    fn write_local(&self, content_id: &str, elapsed_seconds: u64);

    /// Drop the local position so the next start begins at zero
    fn clear_local(&self, content_id: &str);

    async fn write_remote(&self, record: &ProgressRecord) -> Result<(), PersistenceError>;

    async fn mark_watched(&self, content_id: &str) -> Result<(), PersistenceError>;
}

/// Local store plus StreamHive API
pub struct SyncedProgressStore {
    local: Arc<LocalStore>,
    remote: Arc<StreamHiveClient>,
    session: Arc<dyn SessionProvider>,
}

impl SyncedProgressStore {
    pub fn new(
        local: Arc<LocalStore>,
        remote: Arc<StreamHiveClient>,
        session: Arc<dyn SessionProvider>,
    ) -> Self {
        Self {
            local,
            remote,
            session,
        }
    }

    fn token(&self) -> Result<String, PersistenceError> {
        self.session.token().ok_or(PersistenceError::Unauthenticated)
    }
}

/// Every local checkpoint, sorted by content id
pub fn local_checkpoints(store: &LocalStore) -> Vec<ProgressRecord> {
    store
        .with_prefix(POSITION_KEY_PREFIX)
        .into_iter()
        .filter_map(|(id, value)| {
            value
                .trim()
                .parse()
                .ok()
                .map(|secs| ProgressRecord::new(id, secs))
        })
        .collect()
}

#[async_trait]
impl ProgressStore for SyncedProgressStore {
    fn read_local(&self, content_id: &str) -> Option<u64> {
        self.local
            .get(&position_key(content_id))
            .and_then(|v| v.trim().parse().ok())
    }

    fn write_local(&self, content_id: &str, elapsed_seconds: u64) {
        if let Err(e) = self
            .local
            .set(&position_key(content_id), elapsed_seconds.to_string())
        {
            warn!("Local checkpoint for {} failed: {}", content_id, e);
        }
    }

    fn clear_local(&self, content_id: &str) {
        if let Err(e) = self.local.remove(&position_key(content_id)) {
            warn!("Clearing checkpoint for {} failed: {}", content_id, e);
        }
    }

    async fn write_remote(&self, record: &ProgressRecord) -> Result<(), PersistenceError> {
        let token = self.token()?;
        self.remote.save_progress(&token, record).await?;
        Ok(())
    }

    async fn mark_watched(&self, content_id: &str) -> Result<(), PersistenceError> {
        let token = self.token()?;
        self.remote.mark_watched(&token, content_id).await?;
        Ok(())
    }
}
