//! Feeding-schedule engine.
//!
//! # Responsibility
//! - Orchestrate block/entry repositories, timezone conversion, and the
//!   elimination policy into the schedule operations callers see.
//! - Own the transaction boundaries of every multi-row mutation.
//!
//! # Invariants
//! - Block `number` values stay dense 1..N per user across any sequence
//!   of creates and deletes.
//! - Materialization never produces two entries on the same local
//!   calendar day of one block, and never overwrites an existing day.
//! - On an eliminating block, volume writes keep every later entry on
//!   the glide path anchored at the latest rebase point; earlier entries
//!   are never touched.
//! - Absent and foreign-owned records are indistinguishable to callers:
//!   both read as `NotFound`.

use crate::config::{ConfigError, EngineConfig};
use crate::model::block::{BlockId, FeedingBlock};
use crate::model::entry::{EntryId, FeedingEntry};
use crate::policy;
use crate::repo::block_repo::{BlockRepository, SqliteBlockRepository};
use crate::repo::entry_repo::{EntryRepository, SqliteEntryRepository};
use crate::repo::RepoError;
use crate::tz::{self, TzError};
use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use chrono_tz::Tz;
use log::info;
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Errors from schedule engine operations.
#[derive(Debug)]
pub enum EngineError {
    /// Block or entry absent, or owned by another user. Collapsed so the
    /// existence of foreign data never leaks.
    NotFound,
    /// Caller-supplied value is unusable (blank username, negative or
    /// non-finite volume, calendar overflow).
    BadRequest(String),
    /// A storage uniqueness constraint rejected the write (duplicate
    /// day, duplicate block number).
    Conflict(String),
    /// Unrecognized timezone identifier or rejected engine configuration.
    Configuration(String),
    /// Repository-level failure.
    Repo(RepoError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "feeding block or entry not found"),
            Self::BadRequest(message) => write!(f, "bad request: {message}"),
            Self::Conflict(message) => write!(f, "conflict: {message}"),
            Self::Configuration(message) => write!(f, "configuration error: {message}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for EngineError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::BlockNotFound(_) | RepoError::EntryNotFound(_) => Self::NotFound,
            RepoError::Conflict(message) => Self::Conflict(message),
            RepoError::BlockValidation(err) => Self::BadRequest(err.to_string()),
            RepoError::EntryValidation(err) => Self::BadRequest(err.to_string()),
            other => Self::Repo(other),
        }
    }
}

impl From<TzError> for EngineError {
    fn from(value: TzError) -> Self {
        Self::Configuration(value.to_string())
    }
}

impl From<ConfigError> for EngineError {
    fn from(value: ConfigError) -> Self {
        Self::Configuration(value.to_string())
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(value: rusqlite::Error) -> Self {
        Self::from(RepoError::from(value))
    }
}

/// One block plus the entries of a requested display window.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockWithEntries {
    pub block: FeedingBlock,
    pub entries: Vec<FeedingEntry>,
}

/// Schedule engine over one migrated SQLite connection.
///
/// Transactions are connection-level, so the engine and its repositories
/// share the borrowed connection; multi-row operations open an immediate
/// transaction and every repository call inside participates in it.
pub struct ScheduleEngine<'conn> {
    conn: &'conn Connection,
    blocks: SqliteBlockRepository<'conn>,
    entries: SqliteEntryRepository<'conn>,
    config: EngineConfig,
}

impl<'conn> ScheduleEngine<'conn> {
    /// Creates an engine after validating the configuration and the
    /// connection schema.
    pub fn new(conn: &'conn Connection, config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let blocks = SqliteBlockRepository::try_new(conn)?;
        let entries = SqliteEntryRepository::try_new(conn)?;
        Ok(Self {
            conn,
            blocks,
            entries,
            config,
        })
    }

    /// Returns the active configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Creates a block at the user's next dense number and materializes
    /// one entry per local day from the start of the current week through
    /// `today + initial_horizon_months`, each stamped with the wall-clock
    /// time of `now` in `zone`.
    ///
    /// Returns the block plus only the entries of the current local week;
    /// callers needing more must query explicitly.
    pub fn create_block_with_entries(
        &self,
        username: &str,
        is_eliminating: bool,
        zone: &str,
        now: DateTime<Utc>,
    ) -> Result<BlockWithEntries, EngineError> {
        let started_at = Instant::now();
        ensure_username(username)?;
        let zone = tz::parse_zone(zone)?;

        let tx = self.immediate_tx()?;
        let next_number = self.blocks.max_block_number(username)? + 1;
        let block = FeedingBlock::new(username, next_number, is_eliminating);
        self.blocks.create_block(&block)?;

        let today = tz::local_day(now, zone);
        let first_day = tz::week_start_date(today, self.config.week_start);
        let last_day = today
            .checked_add_months(Months::new(self.config.initial_horizon_months))
            .ok_or_else(calendar_overflow)?;

        let mut created = Vec::new();
        let mut day = first_day;
        while day <= last_day {
            let feeding_time = tz::combine_date_and_time_of_day(day, now, zone);
            let entry = FeedingEntry::new(block.id, feeding_time);
            self.entries.insert_entry(&entry, day)?;
            created.push(entry);
            day = next_day(day)?;
        }
        tx.commit()?;

        info!(
            "event=block_create module=engine status=ok username={} number={} entries={} duration_ms={}",
            block.username,
            block.number,
            created.len(),
            started_at.elapsed().as_millis()
        );

        let (week_start, week_end) = tz::week_range(today, zone, self.config.week_start);
        let entries = created
            .into_iter()
            .filter(|entry| entry.feeding_time >= week_start && entry.feeding_time < week_end)
            .collect();

        Ok(BlockWithEntries { block, entries })
    }

    /// Idempotent get-or-create for the 7-day window starting at
    /// `week_start` (a local date in `zone`).
    ///
    /// Days already holding an entry are left untouched; missing days are
    /// filled with the time-of-day of the most recent entry before the
    /// window, or local noon when the block has none. Returns the full
    /// window ordered by time.
    pub fn entries_for_week(
        &self,
        block_id: BlockId,
        username: &str,
        week_start: NaiveDate,
        zone: &str,
    ) -> Result<Vec<FeedingEntry>, EngineError> {
        let zone = tz::parse_zone(zone)?;
        let block = self.owned_block(block_id, username)?;

        let (range_start, range_end) = day_span(week_start, week_start + Duration::days(6), zone)?;
        let existing = self.entries.entries_in_range(block.id, range_start, range_end)?;
        if existing.len() == 7 {
            return Ok(self.present_entries(&block, existing, zone));
        }

        let pattern = self.entries.most_recent_entry_before(block.id, range_start)?;
        let occupied: HashSet<NaiveDate> = existing
            .iter()
            .map(|entry| tz::local_day(entry.feeding_time, zone))
            .collect();

        let tx = self.immediate_tx()?;
        let mut created = 0usize;
        let mut day = week_start;
        for _ in 0..7 {
            if !occupied.contains(&day) {
                let feeding_time = match &pattern {
                    Some(previous) => {
                        tz::combine_date_and_time_of_day(day, previous.feeding_time, zone)
                    }
                    None => tz::local_noon(day, zone),
                };
                let entry = FeedingEntry::new(block.id, feeding_time);
                self.entries.insert_entry(&entry, day)?;
                created += 1;
            }
            day = next_day(day)?;
        }
        tx.commit()?;

        if created > 0 {
            info!(
                "event=week_fill module=engine status=ok block={} week_start={} created={}",
                block.id, week_start, created
            );
        }

        let filled = self.entries.entries_in_range(block.id, range_start, range_end)?;
        Ok(self.present_entries(&block, filled, zone))
    }

    /// Explicit bulk materialization of one extension horizon beyond
    /// `from_date`, skipping any local day that already has an entry.
    ///
    /// Returns the newly created entries ordered by time.
    pub fn extend_entries_forward(
        &self,
        block_id: BlockId,
        username: &str,
        from_date: NaiveDate,
        zone: &str,
    ) -> Result<Vec<FeedingEntry>, EngineError> {
        let zone = tz::parse_zone(zone)?;
        let block = self.owned_block(block_id, username)?;

        let first_day = next_day(from_date)?;
        let last_day = from_date
            .checked_add_months(Months::new(self.config.extension_horizon_months))
            .ok_or_else(calendar_overflow)?;
        let (range_start, range_end) = day_span(first_day, last_day, zone)?;

        // Skip-by-local-day, not by instant: time-of-day drift between
        // materialization passes must not duplicate a day.
        let existing = self.entries.entries_in_range(block.id, range_start, range_end)?;
        let occupied: HashSet<NaiveDate> = existing
            .iter()
            .map(|entry| tz::local_day(entry.feeding_time, zone))
            .collect();
        let pattern = self.entries.most_recent_entry_before(block.id, range_start)?;

        let tx = self.immediate_tx()?;
        let mut created = Vec::new();
        let mut day = first_day;
        while day <= last_day {
            if !occupied.contains(&day) {
                let feeding_time = match &pattern {
                    Some(previous) => {
                        tz::combine_date_and_time_of_day(day, previous.feeding_time, zone)
                    }
                    None => tz::local_noon(day, zone),
                };
                let entry = FeedingEntry::new(block.id, feeding_time);
                self.entries.insert_entry(&entry, day)?;
                created.push(entry);
            }
            day = next_day(day)?;
        }
        tx.commit()?;

        info!(
            "event=entries_extend module=engine status=ok block={} from={} created={}",
            block.id,
            from_date,
            created.len()
        );

        Ok(self.present_entries(&block, created, zone))
    }

    /// Moves the time-of-day of every entry on or after the local day of
    /// `new_local_time`, preserving each entry's calendar day. On an
    /// eliminating block the affected volumes are recomputed, since a new
    /// time-of-day can shift an entry across a day boundary of the glide
    /// path.
    ///
    /// Returns the block with the entries of the week containing
    /// `new_local_time`.
    pub fn update_all_entry_times(
        &self,
        block_id: BlockId,
        username: &str,
        new_local_time: NaiveDateTime,
        zone: &str,
    ) -> Result<BlockWithEntries, EngineError> {
        let started_at = Instant::now();
        let zone_id = zone;
        let zone = tz::parse_zone(zone)?;
        let mut block = self.owned_block(block_id, username)?;

        let pivot_day = new_local_time.date();
        let time_of_day = new_local_time.time();
        let pivot_start = tz::combine_date_and_time(pivot_day, NaiveTime::MIN, zone);

        let tx = self.immediate_tx()?;
        let affected = self.entries.entries_from(block.id, pivot_start)?;
        for entry in &affected {
            let day = tz::local_day(entry.feeding_time, zone);
            let feeding_time = tz::combine_date_and_time(day, time_of_day, zone);
            if block.is_eliminating {
                if let Some(volume) =
                    self.recompute_volume_for_time_change(&mut block, entry, feeding_time, zone)?
                {
                    self.entries.update_entry_volume(entry.id, Some(volume))?;
                }
            }
            self.entries.update_entry_time(entry.id, feeding_time, day)?;
        }
        tx.commit()?;

        info!(
            "event=entry_times_shift module=engine status=ok block={} zone={} shifted={} duration_ms={}",
            block.id,
            zone_id,
            affected.len(),
            started_at.elapsed().as_millis()
        );

        let (week_start, week_end) = tz::week_range(pivot_day, zone, self.config.week_start);
        let entries = self.entries.entries_in_range(block.id, week_start, week_end)?;
        let block = self.owned_block(block_id, username)?;
        let entries = self.present_entries(&block, entries, zone);
        Ok(BlockWithEntries { block, entries })
    }

    /// Starts the elimination phase at `start` with the given baseline.
    ///
    /// Existing entry volumes are not rewritten here; they are recomputed
    /// lazily by the next volume or time write. Returns the block with
    /// the entries of the supplied week window.
    pub fn start_elimination(
        &self,
        block_id: BlockId,
        username: &str,
        start: DateTime<Utc>,
        baseline_volume: f64,
        week_start: NaiveDate,
        zone: &str,
    ) -> Result<BlockWithEntries, EngineError> {
        ensure_volume(baseline_volume)?;
        let zone = tz::parse_zone(zone)?;
        let block = self.owned_block(block_id, username)?;

        self.blocks.set_elimination(block.id, start, baseline_volume, 0)?;
        info!(
            "event=elimination_start module=engine status=ok block={} baseline={}",
            block.id, baseline_volume
        );

        let (range_start, range_end) = day_span(week_start, week_start + Duration::days(6), zone)?;
        let entries = self.entries.entries_in_range(block.id, range_start, range_end)?;
        let block = self.owned_block(block_id, username)?;
        let entries = self.present_entries(&block, entries, zone);
        Ok(BlockWithEntries { block, entries })
    }

    /// Records a volume on one entry and keeps the rest of the block
    /// consistent, all inside one transaction.
    ///
    /// Non-eliminating block: the value carries forward flat to every
    /// entry at or after this one. Eliminating block: the first volume
    /// ever recorded seeds the elimination reference point verbatim;
    /// afterwards the rebase rule applies (a value below the glide path
    /// moves the baseline, a value above it is clamped), and every later
    /// entry is recomputed against the possibly-rebased baseline. Past
    /// entries are never touched.
    ///
    /// Returns the block with the entries of the supplied week window.
    pub fn update_entry_volume(
        &self,
        entry_id: EntryId,
        username: &str,
        new_volume: f64,
        week_start: NaiveDate,
        zone: &str,
    ) -> Result<BlockWithEntries, EngineError> {
        let started_at = Instant::now();
        ensure_volume(new_volume)?;
        let zone = tz::parse_zone(zone)?;

        let tx = self.immediate_tx()?;
        let entry = self.entries.get_entry(entry_id)?.ok_or(EngineError::NotFound)?;
        let mut block = self
            .blocks
            .get_block(entry.block_id, username)?
            .ok_or(EngineError::NotFound)?;

        if !block.is_eliminating {
            // Flat carry-forward: a manual volume applies until changed
            // again.
            let following = self.entries.entries_from(block.id, entry.feeding_time)?;
            for e in &following {
                self.entries.update_entry_volume(e.id, Some(new_volume))?;
            }
        } else {
            match (block.elimination_start, block.baseline_volume) {
                (Some(start), Some(baseline)) => {
                    let days = policy::days_between(start, entry.feeding_time, zone);
                    if days < 0 {
                        // Predates the glide path; store verbatim and
                        // leave the path alone.
                        self.entries.update_entry_volume(entry.id, Some(new_volume))?;
                    } else {
                        let group = policy::group_number(days, self.config.group_days);
                        let groups_since_rebase = group - block.current_group;
                        let stored = if groups_since_rebase <= 0 {
                            // Anchor group: always the baseline, never
                            // rebased nor reduced.
                            baseline
                        } else {
                            let expected = policy::expected_volume(
                                baseline,
                                groups_since_rebase,
                                self.config.decrement_ounces,
                            );
                            if new_volume < expected {
                                self.blocks.set_baseline(block.id, new_volume, group)?;
                                block.baseline_volume = Some(new_volume);
                                block.current_group = group;
                                new_volume
                            } else {
                                expected
                            }
                        };
                        self.entries.update_entry_volume(entry.id, Some(stored))?;
                        self.cascade_glide_path(&block, &entry, start, zone)?;
                    }
                }
                _ => {
                    // First elimination volume ever recorded seeds the
                    // reference point from this entry verbatim.
                    self.blocks
                        .set_elimination(block.id, entry.feeding_time, new_volume, 0)?;
                    block.elimination_start = Some(entry.feeding_time);
                    block.baseline_volume = Some(new_volume);
                    block.current_group = 0;
                    self.entries.update_entry_volume(entry.id, Some(new_volume))?;
                }
            }
        }
        tx.commit()?;

        info!(
            "event=entry_volume_update module=engine status=ok block={} entry={} volume={} duration_ms={}",
            block.id,
            entry.id,
            new_volume,
            started_at.elapsed().as_millis()
        );

        let (range_start, range_end) = day_span(week_start, week_start + Duration::days(6), zone)?;
        let entries = self.entries.entries_in_range(block.id, range_start, range_end)?;
        let block = self
            .blocks
            .get_block(entry.block_id, username)?
            .ok_or(EngineError::NotFound)?;
        let entries = self.present_entries(&block, entries, zone);
        Ok(BlockWithEntries { block, entries })
    }

    /// Deletes a block, cascade-deleting its entries, and closes the
    /// numbering gap so the owner's blocks stay dense 1..N. Runs in one
    /// transaction so a concurrent create cannot observe a stale maximum.
    pub fn delete_block(&self, block_id: BlockId, username: &str) -> Result<BlockId, EngineError> {
        let started_at = Instant::now();

        let tx = self.immediate_tx()?;
        let block = self.owned_block(block_id, username)?;
        self.blocks.delete_block(block.id, username)?;
        let renumbered = self.blocks.renumber_after_delete(username, block.number)?;
        tx.commit()?;

        info!(
            "event=block_delete module=engine status=ok block={} number={} renumbered={} duration_ms={}",
            block.id,
            block.number,
            renumbered,
            started_at.elapsed().as_millis()
        );

        Ok(block_id)
    }

    /// Lists a user's blocks ordered by number.
    pub fn list_blocks(&self, username: &str) -> Result<Vec<FeedingBlock>, EngineError> {
        self.blocks.list_blocks(username).map_err(Into::into)
    }

    /// Loads one block scoped to its owner.
    pub fn get_block(&self, block_id: BlockId, username: &str) -> Result<FeedingBlock, EngineError> {
        self.owned_block(block_id, username)
    }

    /// Every block of the user with its entries for the local week
    /// containing `anchor`.
    pub fn blocks_with_entries(
        &self,
        username: &str,
        anchor: NaiveDate,
        zone: &str,
    ) -> Result<Vec<BlockWithEntries>, EngineError> {
        let zone = tz::parse_zone(zone)?;
        let (week_start, week_end) = tz::week_range(anchor, zone, self.config.week_start);

        let mut result = Vec::new();
        for block in self.blocks.list_blocks(username)? {
            let entries = self.entries.entries_in_range(block.id, week_start, week_end)?;
            let entries = self.present_entries(&block, entries, zone);
            result.push(BlockWithEntries { block, entries });
        }
        Ok(result)
    }

    /// Flips a block's eliminating flag.
    pub fn set_is_eliminating(
        &self,
        block_id: BlockId,
        username: &str,
        is_eliminating: bool,
    ) -> Result<FeedingBlock, EngineError> {
        let block = self.owned_block(block_id, username)?;
        self.blocks
            .set_is_eliminating(block.id, username, is_eliminating)?;
        self.owned_block(block_id, username)
    }

    /// Moves one entry to a new local wall-clock time, recomputing its
    /// volume when the block is eliminating. A move onto a local day that
    /// already holds another entry of the block is a `Conflict`.
    pub fn update_entry_time(
        &self,
        entry_id: EntryId,
        username: &str,
        new_local_time: NaiveDateTime,
        zone: &str,
    ) -> Result<FeedingEntry, EngineError> {
        let zone = tz::parse_zone(zone)?;

        let tx = self.immediate_tx()?;
        let entry = self.entries.get_entry(entry_id)?.ok_or(EngineError::NotFound)?;
        let mut block = self
            .blocks
            .get_block(entry.block_id, username)?
            .ok_or(EngineError::NotFound)?;

        let feeding_time = tz::to_utc(new_local_time, zone);
        if block.is_eliminating {
            if let Some(volume) =
                self.recompute_volume_for_time_change(&mut block, &entry, feeding_time, zone)?
            {
                self.entries.update_entry_volume(entry.id, Some(volume))?;
            }
        }
        self.entries
            .update_entry_time(entry.id, feeding_time, new_local_time.date())?;
        tx.commit()?;

        self.entries.get_entry(entry_id)?.ok_or(EngineError::NotFound)
    }

    /// Marks one entry done or not done.
    pub fn set_entry_completed(
        &self,
        entry_id: EntryId,
        username: &str,
        completed: bool,
    ) -> Result<FeedingEntry, EngineError> {
        let entry = self.entries.get_entry(entry_id)?.ok_or(EngineError::NotFound)?;
        self.blocks
            .get_block(entry.block_id, username)?
            .ok_or(EngineError::NotFound)?;

        self.entries.set_completed(entry.id, completed)?;
        self.entries.get_entry(entry_id)?.ok_or(EngineError::NotFound)
    }

    /// Deletes one entry of a block the user owns.
    pub fn delete_entry(&self, entry_id: EntryId, username: &str) -> Result<EntryId, EngineError> {
        let tx = self.immediate_tx()?;
        let entry = self.entries.get_entry(entry_id)?.ok_or(EngineError::NotFound)?;
        self.blocks
            .get_block(entry.block_id, username)?
            .ok_or(EngineError::NotFound)?;
        self.entries.delete_entry(entry.id)?;
        tx.commit()?;

        info!(
            "event=entry_delete module=engine status=ok block={} entry={}",
            entry.block_id, entry.id
        );

        Ok(entry_id)
    }

    /// Recompute rule for an entry whose instant is moving to `new_time`.
    ///
    /// Returns `None` when the volume must stay untouched (no elimination
    /// reference point yet, or the new time predates it). A stored volume
    /// below the expected glide-path value rebases the block's baseline
    /// as a side effect, mirroring the volume-update rule; an unrecorded
    /// volume reads the expected value without rebasing.
    fn recompute_volume_for_time_change(
        &self,
        block: &mut FeedingBlock,
        entry: &FeedingEntry,
        new_time: DateTime<Utc>,
        zone: Tz,
    ) -> Result<Option<f64>, EngineError> {
        let (Some(start), Some(baseline)) = (block.elimination_start, block.baseline_volume)
        else {
            return Ok(None);
        };

        let days = policy::days_between(start, new_time, zone);
        if days < 0 {
            return Ok(None);
        }

        let group = policy::group_number(days, self.config.group_days);
        let groups_since_rebase = group - block.current_group;
        if groups_since_rebase <= 0 {
            return Ok(Some(baseline));
        }

        let expected =
            policy::expected_volume(baseline, groups_since_rebase, self.config.decrement_ounces);
        match entry.volume_ounces {
            Some(recorded) if recorded < expected => {
                self.blocks.set_baseline(block.id, recorded, group)?;
                block.baseline_volume = Some(recorded);
                block.current_group = group;
                Ok(Some(recorded))
            }
            _ => Ok(Some(expected)),
        }
    }

    /// Overwrites every entry after `pivot` with its glide-path value
    /// against the block's current (possibly just-rebased) baseline.
    fn cascade_glide_path(
        &self,
        block: &FeedingBlock,
        pivot: &FeedingEntry,
        start: DateTime<Utc>,
        zone: Tz,
    ) -> Result<usize, EngineError> {
        let Some(baseline) = block.baseline_volume else {
            return Ok(0);
        };

        let following = self.entries.entries_from(block.id, pivot.feeding_time)?;
        let mut updated = 0usize;
        for entry in following {
            if entry.id == pivot.id {
                continue;
            }
            let days = policy::days_between(start, entry.feeding_time, zone);
            if days < 0 {
                continue;
            }
            let group = policy::group_number(days, self.config.group_days);
            let groups_since_rebase = group - block.current_group;
            let volume = if groups_since_rebase <= 0 {
                baseline
            } else {
                policy::expected_volume(
                    baseline,
                    groups_since_rebase,
                    self.config.decrement_ounces,
                )
            };
            self.entries.update_entry_volume(entry.id, Some(volume))?;
            updated += 1;
        }
        Ok(updated)
    }

    /// Read-side view of entry volumes: an unrecorded volume on an
    /// eliminating block reads as its computed glide-path value. Nothing
    /// is written; entries before the elimination start keep `None`.
    fn present_entries(
        &self,
        block: &FeedingBlock,
        entries: Vec<FeedingEntry>,
        zone: Tz,
    ) -> Vec<FeedingEntry> {
        if !block.is_eliminating {
            return entries;
        }
        let (Some(start), Some(baseline)) = (block.elimination_start, block.baseline_volume)
        else {
            return entries;
        };

        entries
            .into_iter()
            .map(|mut entry| {
                if entry.volume_ounces.is_none() {
                    let days = policy::days_between(start, entry.feeding_time, zone);
                    if days >= 0 {
                        let group = policy::group_number(days, self.config.group_days);
                        let groups_since_rebase = group - block.current_group;
                        entry.volume_ounces = Some(if groups_since_rebase <= 0 {
                            baseline
                        } else {
                            policy::expected_volume(
                                baseline,
                                groups_since_rebase,
                                self.config.decrement_ounces,
                            )
                        });
                    }
                }
                entry
            })
            .collect()
    }

    fn owned_block(&self, block_id: BlockId, username: &str) -> Result<FeedingBlock, EngineError> {
        self.blocks
            .get_block(block_id, username)?
            .ok_or(EngineError::NotFound)
    }

    fn immediate_tx(&self) -> Result<Transaction<'_>, EngineError> {
        Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate).map_err(Into::into)
    }
}

fn ensure_username(username: &str) -> Result<(), EngineError> {
    if username.trim().is_empty() {
        return Err(EngineError::BadRequest(
            "username must not be blank".to_string(),
        ));
    }
    Ok(())
}

fn ensure_volume(volume: f64) -> Result<(), EngineError> {
    if !volume.is_finite() || volume < 0.0 {
        return Err(EngineError::BadRequest(format!(
            "volume must be a finite value >= 0, got {volume}"
        )));
    }
    Ok(())
}

fn next_day(day: NaiveDate) -> Result<NaiveDate, EngineError> {
    day.succ_opt().ok_or_else(calendar_overflow)
}

fn calendar_overflow() -> EngineError {
    EngineError::BadRequest("date range exceeds the supported calendar".to_string())
}

/// Half-open UTC window covering the local days `first..=last`.
fn day_span(
    first: NaiveDate,
    last: NaiveDate,
    zone: Tz,
) -> Result<(DateTime<Utc>, DateTime<Utc>), EngineError> {
    let end_day = next_day(last)?;
    Ok((
        tz::combine_date_and_time(first, NaiveTime::MIN, zone),
        tz::combine_date_and_time(end_day, NaiveTime::MIN, zone),
    ))
}
