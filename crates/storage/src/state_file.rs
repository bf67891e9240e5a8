// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Locked, atomically-replaced persistence for the state document.
//!
//! Every mutation is: take the advisory lock on `state.json.lock`, read,
//! mutate in memory, write to a temp file, rename over, unlock. Readers
//! without the lock see either the pre- or post-mutation document, never a
//! partial write.

use crate::state::StateDoc;
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Errors from state-file operations.
#[derive(Debug, Error)]
pub enum StateError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("state file parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Handle on the state document at `<state_dir>/state.json`.
#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join("state.json"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        let mut os = self.path.as_os_str().to_os_string();
        os.push(".lock");
        PathBuf::from(os)
    }

    /// Read and parse the document without taking the lock.
    ///
    /// A missing file is the empty document.
    pub fn load(&self) -> Result<StateDoc, StateError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(StateDoc::default()),
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Mutate the document under the exclusive lock.
    ///
    /// The lock is held only for the duration of this call — never across
    /// subprocess launches.
    pub fn update<T>(&self, f: impl FnOnce(&mut StateDoc) -> T) -> Result<T, StateError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path())?;
        lock_file.lock_exclusive()?;

        let result = self.locked_update(f);

        if let Err(e) = fs2::FileExt::unlock(&lock_file) {
            debug!(error = %e, "state lock release failed");
        }
        result
    }

    fn locked_update<T>(&self, f: impl FnOnce(&mut StateDoc) -> T) -> Result<T, StateError> {
        let mut doc = self.load()?;
        let result = f(&mut doc);

        let tmp_path = self.path.with_extension("json.tmp");
        let bytes = serde_json::to_vec_pretty(&doc)?;
        fs::write(&tmp_path, &bytes)?;
        sync_file(&tmp_path)?;
        fs::rename(&tmp_path, &self.path)?;

        Ok(result)
    }
}

fn sync_file(path: &Path) -> io::Result<()> {
    File::open(path)?.sync_all()
}

#[cfg(test)]
#[path = "state_file_tests.rs"]
mod tests;
