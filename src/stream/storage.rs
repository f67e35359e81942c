//! Local persisted storage
//!
//! A small string key/value store backed by one JSON file. It holds the
//! session token, user fields and resume checkpoints. Writes are
//! last-write-wins per key and reads treat absence as "no value".

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;
use tracing::warn;

use crate::models::UserProfile;

/// Key holding the bearer token
pub const TOKEN_KEY: &str = "streamify_token";

const USER_ID_KEY: &str = "user_id";
const USER_NAME_KEY: &str = "user_nome";
const USER_EMAIL_KEY: &str = "user_email";
const USER_AVATAR_KEY: &str = "user_avatar";

/// Errors from persisting the store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to encode storage: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Read access to the authenticated session
pub trait SessionProvider: Send + Sync {
    /// Current bearer token, if logged in
    fn token(&self) -> Option<String>;

    fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }
}

/// File-backed key/value store
#[derive(Debug)]
pub struct LocalStore {
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<String, String>>,
}

impl LocalStore {
    /// Default location (~/.local/share/streamify/storage.json)
    pub fn default_path() -> Option<PathBuf> {
        dirs::data_dir().map(|p| p.join("streamify").join("storage.json"))
    }

    /// Open a store at `path`; a missing or unreadable file starts empty
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match std::fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!("Discarding unreadable storage {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(_) => BTreeMap::new(),
        };

        Self {
            path: Some(path),
            entries: Mutex::new(entries),
        }
    }

    /// A store that never touches disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// Set a value and persist; an unchanged value is not rewritten
    pub fn set(&self, key: &str, value: impl Into<String>) -> Result<(), StorageError> {
        let value = value.into();
        let mut entries = self.lock();
        if entries.get(key) == Some(&value) {
            return Ok(());
        }
        entries.insert(key.to_string(), value);
        self.persist(&entries)
    }

    /// Remove a value and persist; removing an absent key is a no-op
    pub fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.lock();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    /// All entries whose key starts with `prefix`, with the prefix stripped
    pub fn with_prefix(&self, prefix: &str) -> Vec<(String, String)> {
        self.lock()
            .iter()
            .filter_map(|(k, v)| k.strip_prefix(prefix).map(|rest| (rest.to_string(), v.clone())))
            .collect()
    }

    /// Write the whole file synchronously, through a temp file and rename.
    ///
    /// Called from session handlers on the runtime thread; the file holds a
    /// few hundred bytes and changes at most once per checkpoint.
    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<(), StorageError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let write_err = |source| StorageError::Write {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let text = serde_json::to_string_pretty(entries)?;
        let staged = path.with_extension("json.tmp");
        std::fs::write(&staged, text).map_err(write_err)?;
        std::fs::rename(&staged, path).map_err(write_err)
    }

    /// Store the token and user fields from a successful login
    pub fn save_session(&self, token: &str, user: &UserProfile) -> Result<(), StorageError> {
        self.set(TOKEN_KEY, token)?;
        self.set(USER_ID_KEY, user.id.as_str())?;
        self.set(USER_NAME_KEY, user.name.as_str())?;
        self.set(USER_EMAIL_KEY, user.email.as_str())?;
        match &user.avatar_url {
            Some(avatar) => self.set(USER_AVATAR_KEY, avatar.as_str()),
            None => self.remove(USER_AVATAR_KEY),
        }
    }

    /// Forget the token and user fields
    pub fn clear_session(&self) -> Result<(), StorageError> {
        for key in [TOKEN_KEY, USER_ID_KEY, USER_NAME_KEY, USER_EMAIL_KEY, USER_AVATAR_KEY] {
            self.remove(key)?;
        }
        Ok(())
    }

    /// The stored user, if logged in
    pub fn user(&self) -> Option<UserProfile> {
        self.token()?;
        Some(UserProfile {
            id: self.get(USER_ID_KEY).unwrap_or_default(),
            name: self.get(USER_NAME_KEY).unwrap_or_default(),
            email: self.get(USER_EMAIL_KEY).unwrap_or_default(),
            avatar_url: self.get(USER_AVATAR_KEY),
        })
    }
}

impl SessionProvider for LocalStore {
    fn token(&self) -> Option<String> {
        self.get(TOKEN_KEY).filter(|t| !t.is_empty())
    }
}
