//! SQLite migration registry and executor.
//!
//! # Responsibility
//! - Register schema migrations in strictly increasing order.
//! - Apply pending migrations one transactional step at a time.
//!
//! # Invariants
//! - Registry versions are contiguous from 1.
//! - `PRAGMA user_version` always names the last fully applied step, so a
//!   failed step leaves the database resumable at its predecessor.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

/// `(version, sql)` pairs, ascending.
const MIGRATIONS: &[(u32, &str)] = &[(1, include_str!("0001_init.sql"))];

/// Returns the latest migration version known by this binary.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |(version, _)| *version)
}

/// Applies all pending migrations on the provided connection.
///
/// Each step runs in its own transaction and mirrors its version to
/// `PRAGMA user_version` before committing.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let applied = current_user_version(conn)?;
    if applied > latest_version() {
        return Err(DbError::SchemaTooNew {
            found: applied,
            supported: latest_version(),
        });
    }

    for (version, sql) in MIGRATIONS {
        if *version <= applied {
            continue;
        }
        apply_step(conn, *version, sql)?;
        info!("event=db_migrate module=db status=ok version={version}");
    }

    Ok(())
}

fn apply_step(conn: &mut Connection, version: u32, sql: &str) -> DbResult<()> {
    let tx = conn
        .transaction()
        .map_err(|source| DbError::MigrationFailed { version, source })?;
    tx.execute_batch(sql)
        .and_then(|()| tx.execute_batch(&format!("PRAGMA user_version = {version};")))
        .and_then(|()| tx.commit())
        .map_err(|source| DbError::MigrationFailed { version, source })
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
