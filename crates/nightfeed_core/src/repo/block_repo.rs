//! Feeding block repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide stable CRUD and ordering APIs over `feeding_blocks` storage.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths call `FeedingBlock::validate()` before SQL mutations.
//! - Ownership-scoped reads always filter by `username`; an existing but
//!   foreign block reads as absent.
//! - `renumber_after_delete` walks siblings in ascending order so the
//!   `UNIQUE(username, number)` constraint holds at every step.

use crate::db::migrations::latest_version;
use crate::model::block::{BlockId, FeedingBlock};
use crate::repo::{
    bool_to_int, instant_to_ms, int_to_bool, ms_to_instant, parse_uuid, RepoError, RepoResult,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

const BLOCK_SELECT_SQL: &str = "SELECT
    id,
    username,
    number,
    is_eliminating,
    elimination_start_ms,
    baseline_volume,
    current_group
FROM feeding_blocks";

/// Repository interface for feeding block operations.
pub trait BlockRepository {
    /// Inserts one block at its assigned number.
    fn create_block(&self, block: &FeedingBlock) -> RepoResult<()>;
    /// Loads one block scoped to its owner.
    fn get_block(&self, id: BlockId, username: &str) -> RepoResult<Option<FeedingBlock>>;
    /// Lists a user's blocks ordered by `number`.
    fn list_blocks(&self, username: &str) -> RepoResult<Vec<FeedingBlock>>;
    /// Highest `number` currently assigned to the user, 0 when none.
    fn max_block_number(&self, username: &str) -> RepoResult<i64>;
    /// Flips the eliminating flag.
    fn set_is_eliminating(
        &self,
        id: BlockId,
        username: &str,
        is_eliminating: bool,
    ) -> RepoResult<()>;
    /// Sets the elimination reference point in one write.
    fn set_elimination(
        &self,
        id: BlockId,
        start: DateTime<Utc>,
        baseline_volume: f64,
        current_group: i64,
    ) -> RepoResult<()>;
    /// Moves the baseline anchor after a rebase.
    fn set_baseline(&self, id: BlockId, baseline_volume: f64, current_group: i64)
        -> RepoResult<()>;
    /// Deletes one block; entries cascade at the storage layer.
    fn delete_block(&self, id: BlockId, username: &str) -> RepoResult<()>;
    /// Closes the numbering gap left by a deleted block. Returns the
    /// count of renumbered siblings.
    fn renumber_after_delete(&self, username: &str, deleted_number: i64) -> RepoResult<usize>;
}

/// SQLite-backed feeding block repository.
pub struct SqliteBlockRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteBlockRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "feeding_blocks")?;
        Ok(Self { conn })
    }
}

impl BlockRepository for SqliteBlockRepository<'_> {
    fn create_block(&self, block: &FeedingBlock) -> RepoResult<()> {
        block.validate()?;

        self.conn.execute(
            "INSERT INTO feeding_blocks (
                id,
                username,
                number,
                is_eliminating,
                elimination_start_ms,
                baseline_volume,
                current_group
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
            params![
                block.id.to_string(),
                block.username.as_str(),
                block.number,
                bool_to_int(block.is_eliminating),
                block.elimination_start.map(instant_to_ms),
                block.baseline_volume,
                block.current_group,
            ],
        )?;

        Ok(())
    }

    fn get_block(&self, id: BlockId, username: &str) -> RepoResult<Option<FeedingBlock>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{BLOCK_SELECT_SQL} WHERE id = ?1 AND username = ?2;"))?;

        let mut rows = stmt.query(params![id.to_string(), username])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_block_row(row)?));
        }

        Ok(None)
    }

    fn list_blocks(&self, username: &str) -> RepoResult<Vec<FeedingBlock>> {
        let mut stmt = self.conn.prepare(&format!(
            "{BLOCK_SELECT_SQL} WHERE username = ?1 ORDER BY number ASC;"
        ))?;

        let mut rows = stmt.query([username])?;
        let mut blocks = Vec::new();
        while let Some(row) = rows.next()? {
            blocks.push(parse_block_row(row)?);
        }

        Ok(blocks)
    }

    fn max_block_number(&self, username: &str) -> RepoResult<i64> {
        let max = self.conn.query_row(
            "SELECT COALESCE(MAX(number), 0)
             FROM feeding_blocks
             WHERE username = ?1;",
            [username],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    fn set_is_eliminating(
        &self,
        id: BlockId,
        username: &str,
        is_eliminating: bool,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE feeding_blocks
             SET is_eliminating = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1
               AND username = ?2;",
            params![id.to_string(), username, bool_to_int(is_eliminating)],
        )?;

        if changed == 0 {
            return Err(RepoError::BlockNotFound(id));
        }

        Ok(())
    }

    fn set_elimination(
        &self,
        id: BlockId,
        start: DateTime<Utc>,
        baseline_volume: f64,
        current_group: i64,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE feeding_blocks
             SET elimination_start_ms = ?2,
                 baseline_volume = ?3,
                 current_group = ?4,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![
                id.to_string(),
                instant_to_ms(start),
                baseline_volume,
                current_group,
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::BlockNotFound(id));
        }

        Ok(())
    }

    fn set_baseline(
        &self,
        id: BlockId,
        baseline_volume: f64,
        current_group: i64,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE feeding_blocks
             SET baseline_volume = ?2,
                 current_group = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), baseline_volume, current_group],
        )?;

        if changed == 0 {
            return Err(RepoError::BlockNotFound(id));
        }

        Ok(())
    }

    fn delete_block(&self, id: BlockId, username: &str) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM feeding_blocks
             WHERE id = ?1
               AND username = ?2;",
            params![id.to_string(), username],
        )?;

        if changed == 0 {
            return Err(RepoError::BlockNotFound(id));
        }

        Ok(())
    }

    fn renumber_after_delete(&self, username: &str, deleted_number: i64) -> RepoResult<usize> {
        let mut stmt = self.conn.prepare(
            "SELECT id
             FROM feeding_blocks
             WHERE username = ?1
               AND number > ?2
             ORDER BY number ASC;",
        )?;

        let mut rows = stmt.query(params![username, deleted_number])?;
        let mut ids = Vec::new();
        while let Some(row) = rows.next()? {
            let value: String = row.get(0)?;
            ids.push(parse_uuid(&value, "feeding_blocks.id")?);
        }

        for (offset, id) in ids.iter().enumerate() {
            self.conn.execute(
                "UPDATE feeding_blocks
                 SET number = ?2,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                params![id.to_string(), deleted_number + offset as i64],
            )?;
        }

        Ok(ids.len())
    }
}

fn parse_block_row(row: &Row<'_>) -> RepoResult<FeedingBlock> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "feeding_blocks.id")?;

    let is_eliminating = int_to_bool(
        row.get::<_, i64>("is_eliminating")?,
        "feeding_blocks.is_eliminating",
    )?;

    let elimination_start = row
        .get::<_, Option<i64>>("elimination_start_ms")?
        .map(|ms| ms_to_instant(ms, "feeding_blocks.elimination_start_ms"))
        .transpose()?;

    let block = FeedingBlock {
        id,
        username: row.get("username")?,
        number: row.get("number")?,
        is_eliminating,
        elimination_start,
        baseline_volume: row.get("baseline_volume")?,
        current_group: row.get("current_group")?,
    };
    block.validate()?;
    Ok(block)
}

pub(crate) fn ensure_connection_ready(
    conn: &Connection,
    table: &'static str,
) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1
             FROM sqlite_master
             WHERE type = 'table' AND name = ?1;",
            [table],
            |row| row.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Err(RepoError::MissingRequiredTable(table));
    }

    Ok(())
}
