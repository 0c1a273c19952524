//! Snapshot persistence for the in-memory engine.
//!
//! Layout of a snapshot directory:
//!
//! ```text
//! <dir>/
//! ├─ LOCK            # Advisory lock for single-writer
//! └─ snapshot.cbor   # Live tables, CBOR-encoded
//! ```
//!
//! The snapshot file is written to a temporary file first and renamed into
//! place, so a crash leaves either the old or the new snapshot.

use crate::error::{KvError, KvResult};
use crate::memory::InMemoryEngine;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::info;

const LOCK_FILE: &str = "LOCK";
const SNAPSHOT_FILE: &str = "snapshot.cbor";
const SNAPSHOT_TEMP: &str = "snapshot.cbor.tmp";

/// Current snapshot format version.
const SNAPSHOT_VERSION: u16 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    version: u16,
    tables: BTreeMap<String, Vec<(Vec<u8>, Vec<u8>)>>,
}

/// A locked directory holding an engine snapshot.
///
/// Only one `SnapshotDir` can exist per directory at a time; the lock is
/// released when the value is dropped.
#[derive(Debug)]
pub struct SnapshotDir {
    path: PathBuf,
    _lock_file: File,
}

impl SnapshotDir {
    /// Opens or creates a snapshot directory and takes its lock.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `create_if_missing` is false
    /// - Another process holds the lock (returns `Locked`)
    /// - I/O errors occur
    pub fn open(path: &Path, create_if_missing: bool) -> KvResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(KvError::invalid_input(format!(
                    "snapshot directory does not exist: {}",
                    path.display()
                )));
            }
        }
        if !path.is_dir() {
            return Err(KvError::invalid_input(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(KvError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path of the snapshot file.
    #[must_use]
    pub fn snapshot_path(&self) -> PathBuf {
        self.path.join(SNAPSHOT_FILE)
    }

    /// Loads the engine from the snapshot, or returns an empty engine when
    /// no snapshot has been written yet.
    pub fn load(&self) -> KvResult<InMemoryEngine> {
        let path = self.snapshot_path();
        if !path.exists() {
            info!("No snapshot at {:?}, starting empty", path);
            return Ok(InMemoryEngine::new());
        }

        let reader = BufReader::new(File::open(&path)?);
        let file: SnapshotFile =
            ciborium::from_reader(reader).map_err(|e| KvError::Snapshot(e.to_string()))?;
        if file.version != SNAPSHOT_VERSION {
            return Err(KvError::Snapshot(format!(
                "unsupported snapshot version {} (expected {})",
                file.version, SNAPSHOT_VERSION
            )));
        }

        info!("Loaded snapshot from {:?} ({} tables)", path, file.tables.len());
        Ok(InMemoryEngine::with_tables(file.tables))
    }

    /// Writes the engine's live tables to the snapshot file.
    pub fn save(&self, engine: &InMemoryEngine) -> KvResult<()> {
        let file = SnapshotFile {
            version: SNAPSHOT_VERSION,
            tables: engine.export_tables(),
        };

        let temp_path = self.path.join(SNAPSHOT_TEMP);
        {
            let mut writer = BufWriter::new(File::create(&temp_path)?);
            ciborium::into_writer(&file, &mut writer)
                .map_err(|e| KvError::Snapshot(e.to_string()))?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&temp_path, self.snapshot_path())?;

        info!(
            "Saved snapshot to {:?} ({} tables)",
            self.snapshot_path(),
            file.tables.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::KvEngine;
    use tempfile::TempDir;

    #[test]
    fn empty_dir_loads_empty_engine() {
        let dir = TempDir::new().unwrap();
        let snap = SnapshotDir::open(dir.path(), true).unwrap();
        let engine = snap.load().unwrap();
        assert!(engine.table_names().is_empty());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = TempDir::new().unwrap();
        {
            let snap = SnapshotDir::open(dir.path(), true).unwrap();
            let engine = InMemoryEngine::new();
            let mut txn = engine.begin().unwrap();
            engine.put(&mut txn, "ns.index", b"k1", b"d1").unwrap();
            engine.put(&mut txn, "ns.scope", b"name", &1u64.to_be_bytes()).unwrap();
            engine.commit(txn).unwrap();
            engine.sequence_next("ns.sequence", b"scope", 1).unwrap();
            snap.save(&engine).unwrap();
        }

        let snap = SnapshotDir::open(dir.path(), false).unwrap();
        let engine = snap.load().unwrap();
        assert_eq!(engine.get("ns.index", b"k1").unwrap(), Some(b"d1".to_vec()));
        assert_eq!(engine.sequence_next("ns.sequence", b"scope", 1).unwrap(), 1);
    }

    #[test]
    fn second_open_is_locked() {
        let dir = TempDir::new().unwrap();
        let _first = SnapshotDir::open(dir.path(), true).unwrap();
        assert!(matches!(
            SnapshotDir::open(dir.path(), true),
            Err(KvError::Locked)
        ));
    }

    #[test]
    fn missing_dir_without_create_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(SnapshotDir::open(&missing, false)
            .unwrap_err()
            .is_input_error());
    }
}
