//! Feeding entry repository contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and time-range query APIs over `feeding_entries`.
//! - Keep the per-day uniqueness column (`local_day`) in step with every
//!   write that creates an entry or moves its calendar day.
//!
//! # Invariants
//! - Range queries are half-open `[start, end)` on `feeding_time_ms`,
//!   ordered by time then id.
//! - Write paths call `FeedingEntry::validate()` before SQL mutations.
//! - A duplicate `(block_id, local_day)` insert surfaces as `Conflict`.

use crate::model::entry::{EntryId, FeedingEntry};
use crate::repo::block_repo::ensure_connection_ready;
use crate::repo::{bool_to_int, instant_to_ms, ms_to_instant, parse_uuid, RepoError, RepoResult};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, Row};

const ENTRY_SELECT_SQL: &str = "SELECT
    id,
    block_id,
    feeding_time_ms,
    volume_ounces,
    completed
FROM feeding_entries";

/// Repository interface for feeding entry operations.
pub trait EntryRepository {
    /// Inserts one entry stamped with its local calendar day.
    fn insert_entry(&self, entry: &FeedingEntry, local_day: NaiveDate) -> RepoResult<()>;
    /// Loads one entry by id.
    fn get_entry(&self, id: EntryId) -> RepoResult<Option<FeedingEntry>>;
    /// Entries of one block inside `[start, end)`, ordered by time.
    fn entries_in_range(
        &self,
        block_id: uuid::Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepoResult<Vec<FeedingEntry>>;
    /// Entries of one block at or after `start`, ordered by time.
    fn entries_from(
        &self,
        block_id: uuid::Uuid,
        start: DateTime<Utc>,
    ) -> RepoResult<Vec<FeedingEntry>>;
    /// Latest entry strictly before `instant`, if any.
    fn most_recent_entry_before(
        &self,
        block_id: uuid::Uuid,
        instant: DateTime<Utc>,
    ) -> RepoResult<Option<FeedingEntry>>;
    /// All entries of one block, ordered by time.
    fn list_entries(&self, block_id: uuid::Uuid) -> RepoResult<Vec<FeedingEntry>>;
    /// Overwrites one entry's recorded volume.
    fn update_entry_volume(&self, id: EntryId, volume_ounces: Option<f64>) -> RepoResult<()>;
    /// Moves one entry's instant and calendar-day stamp together.
    fn update_entry_time(
        &self,
        id: EntryId,
        feeding_time: DateTime<Utc>,
        local_day: NaiveDate,
    ) -> RepoResult<()>;
    /// Marks one entry done or not done.
    fn set_completed(&self, id: EntryId, completed: bool) -> RepoResult<()>;
    /// Deletes one entry.
    fn delete_entry(&self, id: EntryId) -> RepoResult<()>;
}

/// SQLite-backed feeding entry repository.
pub struct SqliteEntryRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteEntryRepository<'conn> {
    /// Creates a repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, "feeding_entries")?;
        Ok(Self { conn })
    }
}

impl EntryRepository for SqliteEntryRepository<'_> {
    fn insert_entry(&self, entry: &FeedingEntry, local_day: NaiveDate) -> RepoResult<()> {
        entry.validate()?;

        self.conn.execute(
            "INSERT INTO feeding_entries (
                id,
                block_id,
                feeding_time_ms,
                local_day,
                volume_ounces,
                completed
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            params![
                entry.id.to_string(),
                entry.block_id.to_string(),
                instant_to_ms(entry.feeding_time),
                day_to_db(local_day),
                entry.volume_ounces,
                bool_to_int(entry.completed),
            ],
        )?;

        Ok(())
    }

    fn get_entry(&self, id: EntryId) -> RepoResult<Option<FeedingEntry>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{ENTRY_SELECT_SQL} WHERE id = ?1;"))?;

        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entry_row(row)?));
        }

        Ok(None)
    }

    fn entries_in_range(
        &self,
        block_id: uuid::Uuid,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> RepoResult<Vec<FeedingEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ENTRY_SELECT_SQL}
             WHERE block_id = ?1
               AND feeding_time_ms >= ?2
               AND feeding_time_ms < ?3
             ORDER BY feeding_time_ms ASC, id ASC;"
        ))?;

        let mut rows = stmt.query(params![
            block_id.to_string(),
            instant_to_ms(start),
            instant_to_ms(end),
        ])?;
        collect_entries(&mut rows)
    }

    fn entries_from(
        &self,
        block_id: uuid::Uuid,
        start: DateTime<Utc>,
    ) -> RepoResult<Vec<FeedingEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ENTRY_SELECT_SQL}
             WHERE block_id = ?1
               AND feeding_time_ms >= ?2
             ORDER BY feeding_time_ms ASC, id ASC;"
        ))?;

        let mut rows = stmt.query(params![block_id.to_string(), instant_to_ms(start)])?;
        collect_entries(&mut rows)
    }

    fn most_recent_entry_before(
        &self,
        block_id: uuid::Uuid,
        instant: DateTime<Utc>,
    ) -> RepoResult<Option<FeedingEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ENTRY_SELECT_SQL}
             WHERE block_id = ?1
               AND feeding_time_ms < ?2
             ORDER BY feeding_time_ms DESC, id DESC
             LIMIT 1;"
        ))?;

        let mut rows = stmt.query(params![block_id.to_string(), instant_to_ms(instant)])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_entry_row(row)?));
        }

        Ok(None)
    }

    fn list_entries(&self, block_id: uuid::Uuid) -> RepoResult<Vec<FeedingEntry>> {
        let mut stmt = self.conn.prepare(&format!(
            "{ENTRY_SELECT_SQL}
             WHERE block_id = ?1
             ORDER BY feeding_time_ms ASC, id ASC;"
        ))?;

        let mut rows = stmt.query([block_id.to_string()])?;
        collect_entries(&mut rows)
    }

    fn update_entry_volume(&self, id: EntryId, volume_ounces: Option<f64>) -> RepoResult<()> {
        if let Some(volume) = volume_ounces {
            if !(volume >= 0.0) {
                return Err(RepoError::EntryValidation(
                    crate::model::entry::EntryValidationError::NegativeVolume(volume),
                ));
            }
        }

        let changed = self.conn.execute(
            "UPDATE feeding_entries
             SET volume_ounces = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), volume_ounces],
        )?;

        if changed == 0 {
            return Err(RepoError::EntryNotFound(id));
        }

        Ok(())
    }

    fn update_entry_time(
        &self,
        id: EntryId,
        feeding_time: DateTime<Utc>,
        local_day: NaiveDate,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE feeding_entries
             SET feeding_time_ms = ?2,
                 local_day = ?3,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), instant_to_ms(feeding_time), day_to_db(local_day)],
        )?;

        if changed == 0 {
            return Err(RepoError::EntryNotFound(id));
        }

        Ok(())
    }

    fn set_completed(&self, id: EntryId, completed: bool) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE feeding_entries
             SET completed = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE id = ?1;",
            params![id.to_string(), bool_to_int(completed)],
        )?;

        if changed == 0 {
            return Err(RepoError::EntryNotFound(id));
        }

        Ok(())
    }

    fn delete_entry(&self, id: EntryId) -> RepoResult<()> {
        let changed = self.conn.execute(
            "DELETE FROM feeding_entries WHERE id = ?1;",
            [id.to_string()],
        )?;

        if changed == 0 {
            return Err(RepoError::EntryNotFound(id));
        }

        Ok(())
    }
}

fn collect_entries(rows: &mut rusqlite::Rows<'_>) -> RepoResult<Vec<FeedingEntry>> {
    let mut entries = Vec::new();
    while let Some(row) = rows.next()? {
        entries.push(parse_entry_row(row)?);
    }
    Ok(entries)
}

fn parse_entry_row(row: &Row<'_>) -> RepoResult<FeedingEntry> {
    let id_text: String = row.get("id")?;
    let id = parse_uuid(&id_text, "feeding_entries.id")?;

    let block_id_text: String = row.get("block_id")?;
    let block_id = parse_uuid(&block_id_text, "feeding_entries.block_id")?;

    let feeding_time = ms_to_instant(
        row.get::<_, i64>("feeding_time_ms")?,
        "feeding_entries.feeding_time_ms",
    )?;

    let completed = match row.get::<_, i64>("completed")? {
        0 => false,
        1 => true,
        other => {
            return Err(RepoError::InvalidData(format!(
                "invalid completed value `{other}` in feeding_entries.completed"
            )));
        }
    };

    let entry = FeedingEntry {
        id,
        block_id,
        feeding_time,
        volume_ounces: row.get("volume_ounces")?,
        completed,
    };
    entry.validate()?;
    Ok(entry)
}

fn day_to_db(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}
