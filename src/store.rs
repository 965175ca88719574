//! Durable "last seen item" state.
//!
//! The state file is a single JSON document:
//!
//! ```json
//! { "lastVideoId_UCabc": { "videoId": "dQw4w9WgXcQ" } }
//! ```
//!
//! [`JsonFileStore`] re-reads the file on every [`get`](StateStore::get) and
//! [`set`](StateStore::set), so edits made to the file while the process is
//! running are picked up on the next access.  Writes rewrite the whole
//! document through a temp file in the same directory followed by a rename,
//! so the file on disk is always either the old or the new document.
//!
//! A file that does not parse is treated as empty and logged at `warn`.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::warn;

/// Prefix of every per-channel key.
const KEY_PREFIX: &str = "lastVideoId_";

/// Store key for a channel.
///
/// The prefix is fixed and the identifier is kept whole, so two distinct
/// identifiers can never map to the same key.
pub fn channel_key(channel_id: &str) -> String {
    format!("{KEY_PREFIX}{channel_id}")
}

/// What is persisted for each channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Last item a notification went out for; `None` if never notified.
    #[serde(rename = "videoId", default)]
    pub video_id: Option<String>,
}

/// The whole state document.
pub type StateMap = BTreeMap<String, StateRecord>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot create state directory {path}: {source}")]
    CreateDir { path: PathBuf, source: io::Error },

    #[error("cannot read state file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },

    #[error("cannot write state file {path}: {source}")]
    Write { path: PathBuf, source: io::Error },

    #[error("cannot serialize state: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Key/value persistence for per-channel state.
pub trait StateStore {
    /// Last notified item id under `key`.
    ///
    /// `Ok(None)` when the key was never set (or was stored as null).
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Durably record `item_id` under `key`.
    fn set(&mut self, key: &str, item_id: &str) -> Result<(), StoreError>;
}

// ---------------------------------------------------------------------------
// JSON file implementation
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open the state file at `path`, creating its directory and an empty
    /// document if either is missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let dir = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };

        fs::create_dir_all(&dir).map_err(|source| StoreError::CreateDir {
            path: dir.clone(),
            source,
        })?;

        let store = Self { path, dir };
        if !store.path.exists() {
            store.persist(&StateMap::new())?;
        } else {
            // Surface corruption at startup rather than on the first read.
            store.load()?;
        }
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current document from disk.
    ///
    /// Missing or unparsable files read as an empty map.
    pub fn load(&self) -> Result<StateMap, StoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StateMap::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        match serde_json::from_str(&raw) {
            Ok(map) => Ok(map),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "state file is not valid, treating it as empty"
                );
                Ok(StateMap::new())
            }
        }
    }

    fn persist(&self, map: &StateMap) -> Result<(), StoreError> {
        let content = serde_json::to_string_pretty(map)?;
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        tmp.write_all(content.as_bytes()).map_err(write_err)?;
        tmp.flush().map_err(write_err)?;
        tmp.as_file_mut().sync_all().map_err(write_err)?;
        tmp.persist(&self.path).map_err(|e| write_err(e.error))?;
        Ok(())
    }
}

impl StateStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.remove(key).and_then(|record| record.video_id))
    }

    fn set(&mut self, key: &str, item_id: &str) -> Result<(), StoreError> {
        let mut map = self.load()?;
        map.insert(
            key.to_string(),
            StateRecord {
                video_id: Some(item_id.to_string()),
            },
        );
        self.persist(&map)
    }
}

// ---------------------------------------------------------------------------
// In-memory implementation
// ---------------------------------------------------------------------------

/// Volatile store for exercising the poll loop without a filesystem.
#[cfg(test)]
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: StateMap,
    /// Number of successful `set` calls.
    pub writes: usize,
    /// When set, every `set` fails without touching the map.
    pub fail_writes: bool,
    /// When set, every `get` fails.
    pub fail_reads: bool,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        if self.fail_reads {
            return Err(StoreError::Read {
                path: PathBuf::from("<memory>"),
                source: io::Error::other("reads disabled"),
            });
        }
        Ok(self.map.get(key).and_then(|record| record.video_id.clone()))
    }

    fn set(&mut self, key: &str, item_id: &str) -> Result<(), StoreError> {
        if self.fail_writes {
            return Err(StoreError::Write {
                path: PathBuf::from("<memory>"),
                source: io::Error::other("writes disabled"),
            });
        }
        self.map.insert(
            key.to_string(),
            StateRecord {
                video_id: Some(item_id.to_string()),
            },
        );
        self.writes += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
