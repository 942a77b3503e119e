//! CBOR snapshots of an engine, and the lock that serializes writers
//! sharing one snapshot file.

use crate::{Ballot, Error, Hash, Record};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::debug;

/// Everything needed to resume an engine: the ballot, its full history and
/// the ids of committed signed commands.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub ballot: Ballot,
    pub history: Vec<Record>,
    pub seen: BTreeSet<Hash>,
}

impl Snapshot {
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)?;
        Ok(buf)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(ciborium::from_reader(bytes)?)
    }

    /// Write the snapshot, replacing the file atomically.
    ///
    /// Concurrent writers must hold a [`StoreLock`] from load to save, or the
    /// last save wins.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Error> {
        let path = path.as_ref();
        let mut tmp = NamedTempFile::new_in(parent_dir(path)?)?;
        tmp.write_all(&self.to_bytes()?)?;
        tmp.persist(path).map_err(|e| e.error)?;
        debug!("Saved snapshot with {} records to {:?}", self.history.len(), path);
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let bytes = fs::read(path.as_ref())?;
        Self::from_bytes(&bytes)
    }
}

/// Exclusive lock on a snapshot file, shared by every process using it.
///
/// The lock is taken on a `.lock` file beside the snapshot, because saving
/// replaces the snapshot file itself. Released on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
    path: PathBuf,
}

impl StoreLock {
    /// Block until the lock for `store` is free, then take it.
    pub fn acquire(store: impl AsRef<Path>) -> Result<Self, Error> {
        let (file, path) = Self::open(store.as_ref())?;
        file.lock()?;
        debug!("Locked {:?}", path);
        Ok(Self { file, path })
    }

    /// Take the lock for `store` if nobody holds it.
    pub fn try_acquire(store: impl AsRef<Path>) -> Result<Option<Self>, Error> {
        let (file, path) = Self::open(store.as_ref())?;
        match file.try_lock() {
            Ok(()) => Ok(Some(Self { file, path })),
            Err(TryLockError::WouldBlock) => Ok(None),
            Err(TryLockError::Error(e)) => Err(e.into()),
        }
    }

    fn open(store: &Path) -> Result<(File, PathBuf), Error> {
        parent_dir(store)?;
        let mut name = OsString::from(store.as_os_str());
        name.push(".lock");
        let path = PathBuf::from(name);
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)?;
        Ok((file, path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Directory holding `path`, created if missing.
fn parent_dir(path: &Path) -> Result<&Path, Error> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)?;
    Ok(parent)
}
