//! Point-in-time copy of the source note store.
//!
//! # Responsibility
//! - Copy the database file (plus WAL/SHM sidecars) into a temporary
//!   directory before any read happens.
//! - Delete the copy on every exit path, including failure.
//!
//! # Invariants
//! - All reads of one export run see a single consistent state.
//! - The live store is never opened for the export itself, so the source
//!   application's locking neither blocks nor is blocked by the export.

use super::{DbError, DbResult};
use log::info;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// WAL-mode sidecar suffixes that must travel with the main file.
const SIDECAR_SUFFIXES: [&str; 2] = ["-wal", "-shm"];

/// Scoped snapshot of the source database.
///
/// The backing directory is removed when this value is dropped.
#[derive(Debug)]
pub struct DbSnapshot {
    dir: TempDir,
    db_path: PathBuf,
}

impl DbSnapshot {
    /// Copies `source` and any present sidecars into a fresh temp directory.
    pub fn acquire(source: impl AsRef<Path>) -> DbResult<Self> {
        let source = source.as_ref();
        if !source.is_file() {
            return Err(DbError::SourceUnreadable(format!(
                "no database file at `{}`",
                source.display()
            )));
        }

        let dir = TempDir::new()
            .map_err(|err| DbError::Snapshot(format!("temp directory: {err}")))?;
        let file_name = source
            .file_name()
            .ok_or_else(|| DbError::Snapshot("source path has no file name".to_string()))?;
        let db_path = dir.path().join(file_name);

        std::fs::copy(source, &db_path).map_err(|err| {
            DbError::Snapshot(format!("copy `{}`: {err}", source.display()))
        })?;

        for suffix in SIDECAR_SUFFIXES {
            let sidecar = sibling_with_suffix(source, suffix);
            if sidecar.is_file() {
                let dest = sibling_with_suffix(&db_path, suffix);
                std::fs::copy(&sidecar, &dest).map_err(|err| {
                    DbError::Snapshot(format!("copy `{}`: {err}", sidecar.display()))
                })?;
            }
        }

        info!(
            "event=snapshot_acquire module=db status=ok source={} snapshot={}",
            source.display(),
            db_path.display()
        );
        Ok(Self { dir, db_path })
    }

    /// Path of the snapshot database file to open.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Directory holding the snapshot, for diagnostics.
    pub fn dir_path(&self) -> &Path {
        self.dir.path()
    }
}

fn sibling_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}
