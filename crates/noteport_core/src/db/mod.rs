//! Read-only access to the source note store.
//!
//! # Responsibility
//! - Open the source SQLite database without ever writing to it.
//! - Provide an in-memory connection for fixtures and tests.
//!
//! # Invariants
//! - File connections are opened `SQLITE_OPEN_READ_ONLY`; the live store
//!   belongs to the source application and must never be mutated here.
//! - Callers read from a point-in-time snapshot, not the live file.

use log::{error, info};
use rusqlite::{Connection, OpenFlags};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::{Duration, Instant};

pub mod snapshot;

pub use snapshot::DbSnapshot;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The source database file does not exist or is not readable.
    SourceUnreadable(String),
    /// Copying the point-in-time snapshot failed.
    Snapshot(String),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::SourceUnreadable(message) => {
                write!(f, "source database unreadable: {message}")
            }
            Self::Snapshot(message) => write!(f, "snapshot copy failed: {message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::SourceUnreadable(_) | Self::Snapshot(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Opens a note store file read-only.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_notes_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode=readonly");

    if !path.is_file() {
        error!(
            "event=db_open module=db status=error error_code=db_missing path={}",
            path.display()
        );
        return Err(DbError::SourceUnreadable(format!(
            "no database file at `{}`",
            path.display()
        )));
    }

    let conn = match Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    ) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };
    conn.busy_timeout(Duration::from_secs(5))?;

    info!(
        "event=db_open module=db status=ok mode=readonly duration_ms={}",
        started_at.elapsed().as_millis()
    );
    Ok(conn)
}

/// Opens a writable in-memory database for fixtures and tests.
pub fn open_db_in_memory() -> DbResult<Connection> {
    let conn = Connection::open_in_memory()?;
    Ok(conn)
}
