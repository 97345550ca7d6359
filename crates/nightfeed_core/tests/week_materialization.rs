use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use nightfeed_core::db::open_db_in_memory;
use nightfeed_core::{
    tz, BlockId, BlockRepository, EngineConfig, EntryRepository, FeedingBlock, FeedingEntry,
    ScheduleEngine, SqliteBlockRepository, SqliteEntryRepository,
};
use rusqlite::Connection;
use std::collections::HashSet;

const ZONE: &str = "America/New_York";

fn small_engine(conn: &Connection) -> ScheduleEngine<'_> {
    let config = EngineConfig {
        initial_horizon_months: 1,
        ..EngineConfig::default()
    };
    ScheduleEngine::new(conn, config).unwrap()
}

fn new_york() -> Tz {
    tz::parse_zone(ZONE).unwrap()
}

fn now() -> DateTime<Utc> {
    // Thu 2026-01-15 19:30 in New York.
    Utc.with_ymd_and_hms(2026, 1, 16, 0, 30, 0).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn entry_count(conn: &Connection, block_id: BlockId) -> i64 {
    conn.query_row(
        "SELECT COUNT(*) FROM feeding_entries WHERE block_id = ?1;",
        [block_id.to_string()],
        |row| row.get(0),
    )
    .unwrap()
}

fn local_days(conn: &Connection, block_id: BlockId) -> Vec<NaiveDate> {
    let repo = SqliteEntryRepository::try_new(conn).unwrap();
    repo.list_entries(block_id)
        .unwrap()
        .iter()
        .map(|entry| tz::local_day(entry.feeding_time, new_york()))
        .collect()
}

fn local_time_of(entry: &FeedingEntry) -> NaiveTime {
    entry.feeding_time.with_timezone(&new_york()).time()
}

#[test]
fn create_materializes_week_start_through_horizon() {
    let conn = open_db_in_memory().unwrap();
    let engine = small_engine(&conn);

    let created = engine
        .create_block_with_entries("casey", false, ZONE, now())
        .unwrap();

    // Mon 2026-01-12 through 2026-02-15 inclusive, one entry per day.
    let days = local_days(&conn, created.block.id);
    assert_eq!(days.len(), 35);
    assert_eq!(days.iter().copied().collect::<HashSet<_>>().len(), 35);
    assert_eq!(days.iter().min().copied(), Some(date(2026, 1, 12)));
    assert_eq!(days.iter().max().copied(), Some(date(2026, 2, 15)));

    // Every entry carries the creation moment's wall-clock time.
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    for entry in repo.list_entries(created.block.id).unwrap() {
        assert_eq!(local_time_of(&entry), NaiveTime::from_hms_opt(19, 30, 0).unwrap());
        assert!(entry.volume_ounces.is_none());
        assert!(!entry.completed);
    }

    // The response carries only the current local week.
    assert_eq!(created.entries.len(), 7);
    let returned_days: Vec<NaiveDate> = created
        .entries
        .iter()
        .map(|entry| tz::local_day(entry.feeding_time, new_york()))
        .collect();
    assert_eq!(returned_days.first().copied(), Some(date(2026, 1, 12)));
    assert_eq!(returned_days.last().copied(), Some(date(2026, 1, 18)));
}

#[test]
fn create_with_default_horizon_covers_three_months_and_delete_cascades() {
    let conn = open_db_in_memory().unwrap();
    let engine = ScheduleEngine::new(&conn, EngineConfig::default()).unwrap();

    let created = engine
        .create_block_with_entries("casey", false, ZONE, now())
        .unwrap();

    // Mon 2026-01-12 through 2026-04-15 inclusive.
    assert_eq!(entry_count(&conn, created.block.id), 94);

    engine.delete_block(created.block.id, "casey").unwrap();
    assert_eq!(entry_count(&conn, created.block.id), 0);
}

#[test]
fn entries_for_week_is_idempotent() {
    let conn = open_db_in_memory().unwrap();
    let engine = small_engine(&conn);

    let created = engine
        .create_block_with_entries("casey", false, ZONE, now())
        .unwrap();
    let before = entry_count(&conn, created.block.id);

    let first = engine
        .entries_for_week(created.block.id, "casey", date(2026, 1, 12), ZONE)
        .unwrap();
    let second = engine
        .entries_for_week(created.block.id, "casey", date(2026, 1, 12), ZONE)
        .unwrap();

    assert_eq!(first.len(), 7);
    let first_ids: Vec<_> = first.iter().map(|entry| entry.id).collect();
    let second_ids: Vec<_> = second.iter().map(|entry| entry.id).collect();
    assert_eq!(first_ids, second_ids);
    assert_eq!(entry_count(&conn, created.block.id), before);
}

#[test]
fn entries_for_week_fills_a_future_week_with_the_prior_pattern() {
    let conn = open_db_in_memory().unwrap();
    let engine = small_engine(&conn);

    let created = engine
        .create_block_with_entries("casey", false, ZONE, now())
        .unwrap();
    let before = entry_count(&conn, created.block.id);

    // Week beyond the materialized horizon (ends 2026-02-15).
    let week = engine
        .entries_for_week(created.block.id, "casey", date(2026, 2, 16), ZONE)
        .unwrap();

    assert_eq!(week.len(), 7);
    assert_eq!(entry_count(&conn, created.block.id), before + 7);
    for entry in &week {
        assert_eq!(local_time_of(entry), NaiveTime::from_hms_opt(19, 30, 0).unwrap());
        assert!(entry.volume_ounces.is_none());
        assert!(!entry.completed);
    }
}

#[test]
fn entries_for_week_defaults_to_noon_without_history() {
    let conn = open_db_in_memory().unwrap();
    let engine = small_engine(&conn);

    let blocks = SqliteBlockRepository::try_new(&conn).unwrap();
    let block = FeedingBlock::new("casey", 1, false);
    blocks.create_block(&block).unwrap();

    let week = engine
        .entries_for_week(block.id, "casey", date(2026, 1, 12), ZONE)
        .unwrap();

    assert_eq!(week.len(), 7);
    for entry in &week {
        assert_eq!(local_time_of(entry), NaiveTime::from_hms_opt(12, 0, 0).unwrap());
    }
}

#[test]
fn entries_for_week_leaves_existing_days_untouched() {
    let conn = open_db_in_memory().unwrap();
    let engine = small_engine(&conn);

    let blocks = SqliteBlockRepository::try_new(&conn).unwrap();
    let entries = SqliteEntryRepository::try_new(&conn).unwrap();
    let block = FeedingBlock::new("casey", 1, false);
    blocks.create_block(&block).unwrap();

    // Pre-existing entry on Wed 2026-01-14 at 08:15 local.
    let wednesday = date(2026, 1, 14);
    let existing = FeedingEntry::new(
        block.id,
        tz::combine_date_and_time(
            wednesday,
            NaiveTime::from_hms_opt(8, 15, 0).unwrap(),
            new_york(),
        ),
    );
    entries.insert_entry(&existing, wednesday).unwrap();

    let week = engine
        .entries_for_week(block.id, "casey", date(2026, 1, 12), ZONE)
        .unwrap();

    assert_eq!(week.len(), 7);
    let kept = week
        .iter()
        .find(|entry| tz::local_day(entry.feeding_time, new_york()) == wednesday)
        .unwrap();
    assert_eq!(kept.id, existing.id);
    assert_eq!(local_time_of(kept), NaiveTime::from_hms_opt(8, 15, 0).unwrap());

    for entry in week.iter().filter(|entry| entry.id != existing.id) {
        assert_eq!(local_time_of(entry), NaiveTime::from_hms_opt(12, 0, 0).unwrap());
    }
}

#[test]
fn extend_forward_skips_days_that_already_have_entries() {
    let conn = open_db_in_memory().unwrap();
    let engine = small_engine(&conn);

    let created = engine
        .create_block_with_entries("casey", false, ZONE, now())
        .unwrap();

    // Horizon ends 2026-02-15; extending from 2026-02-10 must only fill
    // 2026-02-16 through 2026-03-10.
    let extended = engine
        .extend_entries_forward(created.block.id, "casey", date(2026, 2, 10), ZONE)
        .unwrap();

    assert_eq!(extended.len(), 23);
    let extended_days: Vec<NaiveDate> = extended
        .iter()
        .map(|entry| tz::local_day(entry.feeding_time, new_york()))
        .collect();
    assert_eq!(extended_days.first().copied(), Some(date(2026, 2, 16)));
    assert_eq!(extended_days.last().copied(), Some(date(2026, 3, 10)));
    for entry in &extended {
        assert_eq!(local_time_of(entry), NaiveTime::from_hms_opt(19, 30, 0).unwrap());
    }

    // A second identical extension has nothing left to create.
    let again = engine
        .extend_entries_forward(created.block.id, "casey", date(2026, 2, 10), ZONE)
        .unwrap();
    assert!(again.is_empty());
}

#[test]
fn no_duplicate_days_across_materialization_history() {
    let conn = open_db_in_memory().unwrap();
    let engine = small_engine(&conn);

    let created = engine
        .create_block_with_entries("casey", false, ZONE, now())
        .unwrap();
    engine
        .entries_for_week(created.block.id, "casey", date(2026, 2, 16), ZONE)
        .unwrap();
    engine
        .extend_entries_forward(created.block.id, "casey", date(2026, 2, 10), ZONE)
        .unwrap();
    engine
        .entries_for_week(created.block.id, "casey", date(2026, 3, 9), ZONE)
        .unwrap();

    let days = local_days(&conn, created.block.id);
    assert_eq!(days.iter().copied().collect::<HashSet<_>>().len(), days.len());
}

#[test]
fn materialization_spans_the_spring_forward_transition() {
    let conn = open_db_in_memory().unwrap();
    let engine = ScheduleEngine::new(&conn, EngineConfig::default()).unwrap();

    let created = engine
        .create_block_with_entries("casey", false, ZONE, now())
        .unwrap();

    // 2026-03-08 only has 23 local hours; the day still gets exactly one
    // entry at the same wall-clock time.
    let repo = SqliteEntryRepository::try_new(&conn).unwrap();
    let transition_day: Vec<FeedingEntry> = repo
        .list_entries(created.block.id)
        .unwrap()
        .into_iter()
        .filter(|entry| tz::local_day(entry.feeding_time, new_york()) == date(2026, 3, 8))
        .collect();

    assert_eq!(transition_day.len(), 1);
    assert_eq!(
        local_time_of(&transition_day[0]),
        NaiveTime::from_hms_opt(19, 30, 0).unwrap()
    );
}
