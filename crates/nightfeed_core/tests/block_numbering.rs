use chrono::{DateTime, TimeZone, Utc};
use nightfeed_core::db::open_db_in_memory;
use nightfeed_core::{
    BlockRepository, EngineConfig, EngineError, FeedingBlock, RepoError, ScheduleEngine,
    SqliteBlockRepository,
};
use rusqlite::Connection;

const ZONE: &str = "America/New_York";

fn engine(conn: &Connection) -> ScheduleEngine<'_> {
    let config = EngineConfig {
        initial_horizon_months: 1,
        ..EngineConfig::default()
    };
    ScheduleEngine::new(conn, config).unwrap()
}

fn now() -> DateTime<Utc> {
    // Thu 2026-01-15 19:30 in New York.
    Utc.with_ymd_and_hms(2026, 1, 16, 0, 30, 0).unwrap()
}

#[test]
fn creates_assign_dense_numbers() {
    let conn = open_db_in_memory().unwrap();
    let engine = engine(&conn);

    for _ in 0..3 {
        engine
            .create_block_with_entries("casey", false, ZONE, now())
            .unwrap();
    }

    let numbers: Vec<i64> = engine
        .list_blocks("casey")
        .unwrap()
        .iter()
        .map(|block| block.number)
        .collect();
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[test]
fn numbering_is_per_user() {
    let conn = open_db_in_memory().unwrap();
    let engine = engine(&conn);

    engine
        .create_block_with_entries("casey", false, ZONE, now())
        .unwrap();
    let other = engine
        .create_block_with_entries("jordan", false, ZONE, now())
        .unwrap();

    assert_eq!(other.block.number, 1);
}

#[test]
fn deleting_a_middle_block_renumbers_later_siblings() {
    let conn = open_db_in_memory().unwrap();
    let engine = engine(&conn);

    let first = engine
        .create_block_with_entries("casey", false, ZONE, now())
        .unwrap();
    let second = engine
        .create_block_with_entries("casey", false, ZONE, now())
        .unwrap();
    let third = engine
        .create_block_with_entries("casey", false, ZONE, now())
        .unwrap();

    engine.delete_block(second.block.id, "casey").unwrap();

    let blocks = engine.list_blocks("casey").unwrap();
    let numbers: Vec<i64> = blocks.iter().map(|block| block.number).collect();
    assert_eq!(numbers, vec![1, 2]);
    assert_eq!(blocks[0].id, first.block.id);
    assert_eq!(blocks[1].id, third.block.id);

    // The next create lands on the now-free position 3.
    let fourth = engine
        .create_block_with_entries("casey", false, ZONE, now())
        .unwrap();
    assert_eq!(fourth.block.number, 3);
}

#[test]
fn deleting_a_foreign_block_is_not_found() {
    let conn = open_db_in_memory().unwrap();
    let engine = engine(&conn);

    let created = engine
        .create_block_with_entries("casey", false, ZONE, now())
        .unwrap();

    let err = engine.delete_block(created.block.id, "jordan").unwrap_err();
    assert!(matches!(err, EngineError::NotFound));
    assert_eq!(engine.list_blocks("casey").unwrap().len(), 1);
}

#[test]
fn duplicate_block_number_is_a_conflict() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteBlockRepository::try_new(&conn).unwrap();

    repo.create_block(&FeedingBlock::new("casey", 1, false))
        .unwrap();
    let err = repo
        .create_block(&FeedingBlock::new("casey", 1, false))
        .unwrap_err();
    assert!(matches!(err, RepoError::Conflict(_)));
}

#[test]
fn blank_username_is_a_bad_request() {
    let conn = open_db_in_memory().unwrap();
    let engine = engine(&conn);

    let err = engine
        .create_block_with_entries("   ", false, ZONE, now())
        .unwrap_err();
    assert!(matches!(err, EngineError::BadRequest(_)));
}

#[test]
fn unknown_zone_is_a_configuration_error() {
    let conn = open_db_in_memory().unwrap();
    let engine = engine(&conn);

    let err = engine
        .create_block_with_entries("casey", false, "Moon/Tranquility", now())
        .unwrap_err();
    assert!(matches!(err, EngineError::Configuration(_)));
}
