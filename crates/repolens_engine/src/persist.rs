use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use repolens_core::{ContextItem, ContextMap};

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("cache directory missing or not writable: {0}")]
    CacheDir(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt cache file: {0}")]
    Corrupt(String),
}

/// Ensure the cache directory exists; create if missing.
fn ensure_cache_dir(dir: &Path) -> Result<(), PersistError> {
    if dir.exists() {
        let meta = fs::metadata(dir).map_err(|e| PersistError::CacheDir(e.to_string()))?;
        if !meta.is_dir() {
            return Err(PersistError::CacheDir("path is not a directory".into()));
        }
    } else {
        fs::create_dir_all(dir).map_err(|e| PersistError::CacheDir(e.to_string()))?;
    }
    Ok(())
}

/// Atomically write content to `{dir}/{filename}` by writing a temp file
/// then renaming.
pub struct AtomicFileWriter {
    dir: PathBuf,
}

impl AtomicFileWriter {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn write(&self, filename: &str, content: &str) -> Result<PathBuf, PersistError> {
        ensure_cache_dir(&self.dir)?;

        let target = self.dir.join(filename);
        let mut tmp = NamedTempFile::new_in(&self.dir)?;
        tmp.write_all(content.as_bytes())?;
        tmp.flush()?;
        tmp.as_file_mut().sync_all()?;

        // Replace existing file if present to keep determinism.
        if target.exists() {
            fs::remove_file(&target)?;
        }
        tmp.persist(&target)
            .map_err(|e| PersistError::Io(e.error))?;
        Ok(target)
    }
}

// Serialized mirror of the core context types. The format is a plain
// versionless mapping; nothing outside this store depends on its layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredContextItem {
    id: Option<String>,
    filename: String,
    content: String,
    score: Option<f64>,
}

type StoredMap = BTreeMap<String, Vec<StoredContextItem>>;

fn to_stored(map: &ContextMap) -> StoredMap {
    map.iter()
        .map(|(message_id, items)| {
            let items = items
                .iter()
                .map(|item| StoredContextItem {
                    id: item.id.clone(),
                    filename: item.filename.clone(),
                    content: item.content.clone(),
                    score: item.score,
                })
                .collect();
            (message_id.clone(), items)
        })
        .collect()
}

fn from_stored(map: StoredMap) -> ContextMap {
    map.into_iter()
        .map(|(message_id, items)| {
            let items = items
                .into_iter()
                .map(|item| ContextItem {
                    id: item.id,
                    filename: item.filename,
                    content: item.content,
                    score: item.score,
                })
                .collect();
            (message_id, items)
        })
        .collect()
}

/// Local persisted cache: one JSON file per conversation id holding the
/// message-id-keyed context map, so attributions survive a reload.
pub struct ContextStore {
    dir: PathBuf,
}

impl ContextStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn file_name(conversation_id: &str) -> String {
        // Conversation ids are expected to be uuid-ish; defang anything
        // that could escape the cache directory.
        let safe: String = conversation_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        format!("{safe}.json")
    }

    /// Missing file reads as an empty map; a corrupt file is an error the
    /// caller may treat as empty.
    pub fn load(&self, conversation_id: &str) -> Result<ContextMap, PersistError> {
        let path = self.dir.join(Self::file_name(conversation_id));
        let content = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Ok(ContextMap::new());
            }
            Err(err) => return Err(PersistError::Io(err)),
        };
        let stored: StoredMap =
            serde_json::from_str(&content).map_err(|e| PersistError::Corrupt(e.to_string()))?;
        Ok(from_stored(stored))
    }

    /// Write-through merge: last-writer-wins at per-message-id
    /// granularity, never at whole-map granularity, so a concurrent
    /// writer's entries for other messages are not clobbered.
    pub fn merge_write(
        &self,
        conversation_id: &str,
        map: &ContextMap,
    ) -> Result<(), PersistError> {
        let mut on_disk = self.load(conversation_id).unwrap_or_default();
        for (message_id, items) in map {
            on_disk.insert(message_id.clone(), items.clone());
        }
        let content = serde_json::to_string_pretty(&to_stored(&on_disk))
            .map_err(|e| PersistError::Corrupt(e.to_string()))?;
        let writer = AtomicFileWriter::new(self.dir.clone());
        writer.write(&Self::file_name(conversation_id), &content)?;
        Ok(())
    }
}
