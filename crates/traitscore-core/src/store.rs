//! Score record persistence.
//!
//! Records are keyed by session id; re-scoring a session replaces its record.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use crate::error::StoreError;
use crate::report::ScoreRecord;

/// Whether an upsert created or replaced a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
}

/// Keyed storage of score records.
pub trait ScoreStore: Send + Sync {
    /// Store `record` under its session id, replacing any previous record.
    fn upsert(&self, record: &ScoreRecord) -> Result<UpsertOutcome, StoreError>;

    fn fetch(&self, session_id: &str) -> Result<Option<ScoreRecord>, StoreError>;
}

/// Process-local store, mostly for tests and one-shot runs.
#[derive(Debug, Default)]
pub struct InMemoryScoreStore {
    records: Mutex<HashMap<String, ScoreRecord>>,
}

impl InMemoryScoreStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn records(&self) -> MutexGuard<'_, HashMap<String, ScoreRecord>> {
        self.records
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ScoreStore for InMemoryScoreStore {
    fn upsert(&self, record: &ScoreRecord) -> Result<UpsertOutcome, StoreError> {
        let mut records = self.records();
        Ok(match records.insert(record.session_id.clone(), record.clone()) {
            Some(_) => UpsertOutcome::Replaced,
            None => UpsertOutcome::Inserted,
        })
    }

    fn fetch(&self, session_id: &str) -> Result<Option<ScoreRecord>, StoreError> {
        let records = self.records();
        Ok(records.get(session_id).cloned())
    }
}

/// One pretty-printed `<session_id>.json` file per record.
#[derive(Debug, Clone)]
pub struct DirectoryScoreStore {
    root: PathBuf,
}

impl DirectoryScoreStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|source| StoreError::Io {
            path: root.clone(),
            source,
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File a session's record lives in.
    pub fn record_path(&self, session_id: &str) -> Result<PathBuf, StoreError> {
        let valid = !session_id.is_empty()
            && session_id != "."
            && session_id != ".."
            && !session_id.contains(['/', '\\']);
        if !valid {
            return Err(StoreError::InvalidSessionId(session_id.to_string()));
        }
        Ok(self.root.join(format!("{session_id}.json")))
    }
}

impl ScoreStore for DirectoryScoreStore {
    fn upsert(&self, record: &ScoreRecord) -> Result<UpsertOutcome, StoreError> {
        let path = self.record_path(&record.session_id)?;
        let outcome = if path.exists() {
            UpsertOutcome::Replaced
        } else {
            UpsertOutcome::Inserted
        };

        let json = serde_json::to_string_pretty(record)?;
        // readers only ever see a fully written file
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &path).map_err(|source| StoreError::Io {
            path: path.clone(),
            source,
        })?;

        tracing::debug!(
            session = %record.session_id,
            path = %path.display(),
            ?outcome,
            "stored score record"
        );
        Ok(outcome)
    }

    fn fetch(&self, session_id: &str) -> Result<Option<ScoreRecord>, StoreError> {
        let path = self.record_path(session_id)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(StoreError::Io { path, source }),
        };
        Ok(Some(serde_json::from_str(&content)?))
    }
}
