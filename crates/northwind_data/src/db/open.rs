//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or shared in-memory SQLite connections.
//! - Configure connection pragmas required by the data layer.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Shared in-memory targets open through the `memdb` VFS under a `/`-rooted
//!   name, so every connection in the process sees one database and lock
//!   conflicts go through the busy timeout.

use super::DbResult;
use crate::config::ConnectionTarget;
use log::{debug, error};
use rusqlite::{Connection, OpenFlags};
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Opens and configures one connection to `target`.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_connection(target: &ConnectionTarget) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = target.mode();

    let opened = match target {
        ConnectionTarget::File(path) => Connection::open(path),
        ConnectionTarget::SharedMemory(_) => {
            Connection::open_with_flags(sqlite_uri(target), OpenFlags::default())
        }
    };
    let conn = match opened {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={err}",
                started_at.elapsed().as_millis()
            );
            return Err(err.into());
        }
    };

    if let Err(err) = configure_connection(&conn) {
        error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_configure_failed error={err}",
            started_at.elapsed().as_millis()
        );
        return Err(err.into());
    }

    debug!(
        "event=db_open module=db status=ok mode={mode} duration_ms={}",
        started_at.elapsed().as_millis()
    );
    Ok(conn)
}

/// SQLite filename or URI for `target`.
pub fn sqlite_uri(target: &ConnectionTarget) -> String {
    match target {
        ConnectionTarget::File(path) => path.display().to_string(),
        ConnectionTarget::SharedMemory(name) => format!("file:/{name}?vfs=memdb"),
    }
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    Ok(())
}
