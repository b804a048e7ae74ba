use crate::snapshot::{Snapshot, SnapshotPersistence};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

pub const SCHEMA_VERSION: u32 = 1;
const FILE_NAME: &str = "saved_states.json";
const BACKUP_NAME: &str = "saved_states.json.bak";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown schema_version in {path}: {version}")]
    UnknownSchema { path: PathBuf, version: u32 },
}

#[derive(Debug, Serialize, Deserialize)]
struct SavedStatesFile {
    schema_version: u32,
    states: Vec<Snapshot>,
}

// Older installs wrote the bare array without an envelope.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredLayout {
    Versioned(SavedStatesFile),
    Legacy(Vec<Snapshot>),
}

/// Saved states kept as one JSON document under the data directory.
///
/// A file that exists but cannot be read back is moved to
/// `saved_states.json.bak` before the next save replaces it.
#[derive(Debug)]
pub struct JsonFilePersistence {
    dir: PathBuf,
    unreadable: AtomicBool,
}

impl JsonFilePersistence {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            unreadable: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(FILE_NAME)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.dir.join(BACKUP_NAME)
    }

    fn back_up_unreadable(&self) -> Result<(), PersistenceError> {
        if !self.unreadable.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let path = self.path();
        if !path.exists() {
            return Ok(());
        }
        let backup = self.backup_path();
        if let Err(source) = fs::rename(&path, &backup) {
            self.unreadable.store(true, Ordering::SeqCst);
            return Err(PersistenceError::Io {
                path: backup,
                source,
            });
        }
        tracing::warn!(backup = %backup.display(), "unreadable saved states moved aside");
        Ok(())
    }

    fn ensure_dir(&self) -> Result<(), PersistenceError> {
        fs::create_dir_all(&self.dir).map_err(io_error(&self.dir))
    }
}

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> PersistenceError {
    let path = path.to_path_buf();
    move |source| PersistenceError::Io { path, source }
}

fn read_states_file(path: &Path) -> Result<Vec<Snapshot>, PersistenceError> {
    let data = fs::read(path).map_err(io_error(path))?;
    let layout: StoredLayout =
        serde_json::from_slice(&data).map_err(|source| PersistenceError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    match layout {
        StoredLayout::Legacy(states) => Ok(states),
        StoredLayout::Versioned(file) if file.schema_version == SCHEMA_VERSION => Ok(file.states),
        StoredLayout::Versioned(file) => Err(PersistenceError::UnknownSchema {
            path: path.to_path_buf(),
            version: file.schema_version,
        }),
    }
}

impl SnapshotPersistence for JsonFilePersistence {
    fn load(&self) -> Result<Vec<Snapshot>, PersistenceError> {
        let path = self.path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let result = read_states_file(&path);
        if matches!(
            result,
            Err(PersistenceError::Parse { .. } | PersistenceError::UnknownSchema { .. })
        ) {
            self.unreadable.store(true, Ordering::SeqCst);
        }
        result
    }

    fn save(&self, snapshots: &[Snapshot]) -> Result<(), PersistenceError> {
        self.ensure_dir()?;
        self.back_up_unreadable()?;
        let final_path = self.path();
        let tmp_path = self.dir.join(format!("{FILE_NAME}.tmp"));
        let file = SavedStatesFile {
            schema_version: SCHEMA_VERSION,
            states: snapshots.to_vec(),
        };
        let bytes = serde_json::to_vec_pretty(&file).map_err(|source| PersistenceError::Parse {
            path: final_path.clone(),
            source,
        })?;

        fs::write(&tmp_path, bytes).map_err(io_error(&tmp_path))?;
        match fs::rename(&tmp_path, &final_path) {
            Ok(()) => Ok(()),
            Err(rename_err) => {
                if final_path.exists() {
                    fs::remove_file(&final_path).map_err(io_error(&final_path))?;
                    fs::rename(&tmp_path, &final_path).map_err(io_error(&final_path))?;
                    Ok(())
                } else {
                    Err(io_error(&final_path)(rename_err))
                }
            }
        }
    }
}
