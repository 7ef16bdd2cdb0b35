//! Connection bootstrap for SQLite-backed stores.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Apply the connection pragmas selected by `EngineConfig`.
//!
//! # Invariants
//! - Returned connections honor `foreign_keys` and `busy_timeout_ms`.
//! - Schema management is the caller's concern; nothing is created here.

use super::DbResult;
use crate::config::EngineConfig;
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Opens a SQLite database file configured for query execution.
///
/// # Side effects
/// - Emits `store_open` logging events with duration and status.
pub fn open_store(path: impl AsRef<Path>, config: &EngineConfig) -> DbResult<Connection> {
    open_with("file", config, || Connection::open(path))
}

/// Opens an in-memory SQLite database configured for query execution.
///
/// # Side effects
/// - Emits `store_open` logging events with duration and status.
pub fn open_store_in_memory(config: &EngineConfig) -> DbResult<Connection> {
    open_with("memory", config, Connection::open_in_memory)
}

fn open_with(
    mode: &str,
    config: &EngineConfig,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=store_open module=db status=start mode={mode}");

    let conn = match open() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=store_open module=db status=error mode={mode} duration_ms={} error_code=store_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match configure_connection(&conn, config) {
        Ok(()) => {
            info!(
                "event=store_open module=db status=ok mode={mode} duration_ms={} foreign_keys={}",
                started_at.elapsed().as_millis(),
                config.foreign_keys
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=store_open module=db status=error mode={mode} duration_ms={} error_code=store_configure_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn configure_connection(conn: &Connection, config: &EngineConfig) -> DbResult<()> {
    let pragma = if config.foreign_keys {
        "PRAGMA foreign_keys = ON;"
    } else {
        "PRAGMA foreign_keys = OFF;"
    };
    conn.execute_batch(pragma)?;
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{open_store, open_store_in_memory};
    use crate::config::EngineConfig;

    fn foreign_keys(conn: &rusqlite::Connection) -> i64 {
        conn.query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn in_memory_store_enables_foreign_keys_by_default() {
        let conn = open_store_in_memory(&EngineConfig::default()).unwrap();
        assert_eq!(foreign_keys(&conn), 1);
    }

    #[test]
    fn foreign_keys_follow_config() {
        let config = EngineConfig {
            foreign_keys: false,
            ..EngineConfig::default()
        };
        let conn = open_store_in_memory(&config).unwrap();
        assert_eq!(foreign_keys(&conn), 0);
    }

    #[test]
    fn file_store_opens_in_temp_dir() {
        let dir = tempfile::tempdir().unwrap();
        let conn = open_store(dir.path().join("store.sqlite3"), &EngineConfig::default()).unwrap();
        let value: i64 = conn.query_row("SELECT 1", [], |row| row.get(0)).unwrap();
        assert_eq!(value, 1);
    }
}
