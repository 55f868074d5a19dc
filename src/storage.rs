use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::models::{Document, Timestamp};

const FILE_EXT: &str = "json";
const BACKUP_SUFFIX: &str = "-backup";
const CORRUPTED_MARKER: &str = "corrupted";

#[derive(Debug)]
pub enum StorageError {
    Io(std::io::Error),
    Json(serde_json::Error),
}

impl StorageError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::Io(err) if err.kind() == std::io::ErrorKind::NotFound)
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Io(err) => write!(f, "io error: {err}"),
            StorageError::Json(err) => write!(f, "json error: {err}"),
        }
    }
}

impl std::error::Error for StorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StorageError::Io(err) => Some(err),
            StorageError::Json(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(value: std::io::Error) -> Self {
        StorageError::Io(value)
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(value: serde_json::Error) -> Self {
        StorageError::Json(value)
    }
}

/// File layout for one config name inside the data directory:
/// `<name>.json`, `<name>-backup.json` and `<name>.json.corrupted.<epoch-ms>`.
pub struct Storage {
    root: PathBuf,
    config_name: String,
}

impl Storage {
    pub fn new(root: PathBuf, config_name: impl Into<String>) -> Self {
        Self {
            root,
            config_name: config_name.into(),
        }
    }

    pub fn ensure_dirs(&self) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn primary_path(&self) -> PathBuf {
        self.root.join(format!("{}.{FILE_EXT}", self.config_name))
    }

    pub fn backup_path(&self) -> PathBuf {
        self.root
            .join(format!("{}{BACKUP_SUFFIX}.{FILE_EXT}", self.config_name))
    }

    pub fn quarantine_path(&self, at: Timestamp) -> PathBuf {
        self.root.join(format!(
            "{}.{FILE_EXT}.{CORRUPTED_MARKER}.{at}",
            self.config_name
        ))
    }

    /// Fails only when the file is unreadable or not a JSON object. Entries that do not fit
    /// the schema are set aside inside the document (see [`Document::from_stored`]).
    pub fn load_document(&self) -> Result<Document, StorageError> {
        let raw: Value = self.load_json(&self.primary_path())?;
        let (doc, set_aside) = Document::from_stored(raw)?;
        if set_aside > 0 {
            log::warn!("storage: tasks set aside count={set_aside}");
        }
        Ok(doc)
    }

    pub fn save_document(&self, data: &Document) -> Result<usize, StorageError> {
        self.write_atomic(&self.primary_path(), data)
    }

    /// Overwrites the single backup snapshot.
    pub fn save_backup(&self, data: &Document) -> Result<usize, StorageError> {
        self.write_atomic(&self.backup_path(), data)
    }

    /// Copies the primary file aside, byte for byte, so an unreadable document is never lost.
    pub fn quarantine_primary(&self, at: Timestamp) -> Result<PathBuf, StorageError> {
        let target = self.quarantine_path(at);
        fs::copy(self.primary_path(), &target)?;
        Ok(target)
    }

    #[cfg(test)]
    pub fn list_quarantined(&self) -> Result<Vec<PathBuf>, StorageError> {
        let prefix = format!("{}.{FILE_EXT}.{CORRUPTED_MARKER}.", self.config_name);
        let mut found: Vec<PathBuf> = fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| {
                entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| name.starts_with(&prefix))
            })
            .map(|entry| entry.path())
            .collect();
        found.sort();
        Ok(found)
    }

    fn load_json<T: DeserializeOwned>(&self, path: &Path) -> Result<T, StorageError> {
        let mut file = File::open(path)?;
        let mut buf = String::new();
        file.read_to_string(&mut buf)?;
        Ok(serde_json::from_str(&buf)?)
    }

    fn write_atomic<T: Serialize>(&self, path: &Path, data: &T) -> Result<usize, StorageError> {
        let temp_path = path.with_extension("tmp");
        let json = serde_json::to_vec_pretty(data)?;
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(&json)?;
            file.sync_all()?;
        }
        fs::rename(temp_path, path)?;
        Ok(json.len())
    }
}
