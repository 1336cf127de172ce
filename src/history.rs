use crate::dispatcher::{FailureKind, SynthesisResult, VoiceSettings};
use crate::error::PersistenceError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;

const TREE_NAME: &str = "history";

/// Everything recorded about one synthesis attempt, before the store assigns
/// an id and timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub text: String,
    #[serde(rename = "voice_engine")]
    pub engine: String,
    pub voice_name: Option<String>,
    pub settings: VoiceSettings,
    pub audio_file_path: Option<String>,
    #[serde(rename = "duration")]
    pub duration_seconds: Option<f64>,
    pub error_message: Option<String>,
    pub failure_kind: Option<FailureKind>,
}

impl HistoryEntry {
    pub fn from_attempt(text: &str, result: &SynthesisResult) -> Self {
        Self {
            text: text.to_string(),
            engine: result.engine.clone(),
            voice_name: result.voice_name.clone(),
            settings: result.settings.clone(),
            audio_file_path: result
                .audio_file_path()
                .map(|p| p.to_string_lossy().into_owned()),
            duration_seconds: result.duration_seconds(),
            error_message: result.error_message().map(str::to_string),
            failure_kind: result.failure_kind(),
        }
    }
}

/// A persisted attempt, as stored and as served by `/api/history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub id: u64,
    #[serde(flatten)]
    pub entry: HistoryEntry,
    pub created_at: DateTime<Utc>,
}

/// Append-only log of synthesis attempts in a sled tree keyed by big-endian
/// id, so key order is insertion order.
pub struct HistoryStore {
    db: sled::Db,
    tree: sled::Tree,
    default_limit: usize,
    max_limit: usize,
    // Keeps id order and created_at order identical under concurrent writers
    write_lock: Mutex<()>,
}

impl HistoryStore {
    pub fn open(path: &Path, default_limit: usize, max_limit: usize) -> Result<Self, PersistenceError> {
        let db = sled::open(path)?;
        let tree = db.open_tree(TREE_NAME)?;
        Ok(Self {
            db,
            tree,
            default_limit,
            max_limit: max_limit.max(1),
            write_lock: Mutex::new(()),
        })
    }

    /// Assigns id and timestamp, persists and flushes the record.
    pub async fn record(&self, entry: HistoryEntry) -> Result<HistoryRecord, PersistenceError> {
        let record = {
            let _guard = self
                .write_lock
                .lock()
                .map_err(|_| PersistenceError::Poisoned)?;

            let record = HistoryRecord {
                id: self.db.generate_id()?,
                entry,
                created_at: Utc::now(),
            };
            let serialized = serde_json::to_vec(&record)?;
            self.tree.insert(record.id.to_be_bytes(), serialized)?;
            record
        };

        // sled's flush_async stalls when several writers flush at once
        let tree = self.tree.clone();
        tokio::task::spawn_blocking(move || tree.flush()).await??;
        Ok(record)
    }

    /// Newest first. `None` uses the default limit; anything larger than the
    /// configured maximum is capped.
    pub fn list_recent(&self, limit: Option<usize>) -> Result<Vec<HistoryRecord>, PersistenceError> {
        let limit = limit.unwrap_or(self.default_limit).min(self.max_limit);

        let mut records = Vec::with_capacity(limit);
        for item in self.tree.iter().rev().take(limit) {
            let (_key, value) = item?;
            records.push(serde_json::from_slice(&value)?);
        }
        Ok(records)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    #[cfg(test)]
    pub(crate) fn poison_write_lock(&self) {
        let _ = std::thread::scope(|s| {
            s.spawn(|| {
                let _guard = self.write_lock.lock();
                panic!("history writer panicked");
            })
            .join()
        });
    }
}
