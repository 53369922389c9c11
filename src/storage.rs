//! Durable storage for the session snapshot.
//!
//! A single JSON document under one fixed key (a file in the user data
//! directory). The session codec is the only reader and writer; every save
//! overwrites the previous snapshot wholesale.

use color_eyre::{
    eyre::{eyre, WrapErr},
    Result,
};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "tally";
const SNAPSHOT_FILE: &str = "session.json";

/// Handle on the snapshot file.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Store under the platform data directory (created on demand).
    pub fn open_default() -> Result<Self> {
        let base = dirs::data_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| eyre!("No data directory available"))?;
        let dir = base.join(APP_DIR);
        if !dir.exists() {
            fs::create_dir_all(&dir).wrap_err("Failed to create data directory")?;
        }
        Ok(Self {
            path: dir.join(SNAPSHOT_FILE),
        })
    }

    /// Store at an explicit path (tests, alternate profiles).
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write the serialized snapshot, replacing any previous one.
    pub fn save(&self, json: &str) -> Result<()> {
        fs::write(&self.path, json)
            .wrap_err_with(|| format!("Failed to write snapshot to {:?}", self.path))
    }

    /// Read the serialized snapshot. `None` when no snapshot exists yet:
    /// a cold start, not an error.
    pub fn load(&self) -> Result<Option<String>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&self.path)
            .wrap_err_with(|| format!("Failed to read snapshot from {:?}", self.path))?;
        Ok(Some(json))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::at(dir.path().join(SNAPSHOT_FILE));
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_save_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::at(dir.path().join(SNAPSHOT_FILE));

        store.save("{\"a\":1}").unwrap();
        store.save("{\"a\":2}").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("{\"a\":2}"));
    }
}
