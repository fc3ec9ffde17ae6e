//! Write-through persistence of the in-progress answers.
//!
//! Storage is a string key/value backend (the shape of browser local storage);
//! [`DraftStore`] owns the versioned key and the JSON encoding on top of it.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{AnswerSet, Step};

/// Bump the suffix whenever [`AnswerSet`] changes shape incompatibly.
pub const DRAFT_STORAGE_KEY: &str = "eco4_main_form_v2";

/// Persisted snapshot of the answers and the step the visitor was on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub answer_set: AnswerSet,
    pub step: Step,
}

#[derive(Debug, thiserror::Error)]
pub enum DraftError {
    #[error("draft storage unavailable: {0}")]
    Storage(#[from] std::io::Error),
    #[error("draft could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Raw key/value storage backing the draft store.
pub trait DraftBackend: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, DraftError>;
    fn write(&self, key: &str, value: &str) -> Result<(), DraftError>;
    fn remove(&self, key: &str) -> Result<(), DraftError>;
}

#[derive(Debug, Default)]
pub struct MemoryDraftBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryDraftBackend {
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .expect("draft mutex poisoned")
            .get(key)
            .cloned()
    }
}

impl DraftBackend for MemoryDraftBackend {
    fn read(&self, key: &str) -> Result<Option<String>, DraftError> {
        Ok(self.raw(key))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), DraftError> {
        self.entries
            .lock()
            .expect("draft mutex poisoned")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), DraftError> {
        self.entries
            .lock()
            .expect("draft mutex poisoned")
            .remove(key);
        Ok(())
    }
}

/// One `<key>.json` file per key inside `dir`.
#[derive(Debug, Clone)]
pub struct FileDraftBackend {
    dir: PathBuf,
}

impl FileDraftBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl DraftBackend for FileDraftBackend {
    fn read(&self, key: &str) -> Result<Option<String>, DraftError> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(contents) => Ok(Some(contents)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), DraftError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, value)?;
        fs::rename(&staging, &path)?;
        Ok(())
    }

    /// Also removes `dir` once no drafts are left in it.
    fn remove(&self, key: &str) -> Result<(), DraftError> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }

        let emptied = fs::read_dir(&self.dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if emptied {
            fs::remove_dir(&self.dir)?;
        }
        Ok(())
    }
}

#[derive(Clone)]
pub struct DraftStore {
    backend: Arc<dyn DraftBackend>,
    key: String,
}

impl std::fmt::Debug for DraftStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DraftStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

impl DraftStore {
    pub fn new(backend: Arc<dyn DraftBackend>) -> Self {
        Self {
            backend,
            key: DRAFT_STORAGE_KEY.to_string(),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryDraftBackend::default()))
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn save(&self, answers: &AnswerSet, step: Step) -> Result<(), DraftError> {
        let draft = Draft {
            answer_set: answers.clone(),
            step,
        };
        let encoded = serde_json::to_string(&draft)?;
        self.backend.write(&self.key, &encoded)
    }

    /// Missing, unreadable, and corrupt drafts all come back as `None`.
    pub fn load(&self) -> Option<Draft> {
        let raw = match self.backend.read(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(key = %self.key, error = %err, "draft storage unreadable; starting fresh");
                return None;
            }
        };

        match serde_json::from_str::<Draft>(&raw) {
            Ok(draft) => Some(draft),
            Err(err) => {
                warn!(key = %self.key, error = %err, "discarding unparseable draft");
                None
            }
        }
    }

    pub fn clear(&self) -> Result<(), DraftError> {
        self.backend.remove(&self.key)
    }
}
