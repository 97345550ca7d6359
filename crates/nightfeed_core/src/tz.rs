//! Timezone conversion between local wall-clock time and UTC instants.
//!
//! # Responsibility
//! - Resolve caller-supplied IANA zone identifiers.
//! - Convert local dates/times to stored UTC instants and back.
//! - Compute calendar boundaries (day start, week window) in a zone.
//!
//! # Invariants
//! - Every function is pure and safe to call concurrently.
//! - Calendar boundaries are computed in local time and converted to UTC
//!   independently, so DST transitions produce 23- and 25-hour days
//!   instead of drifting boundaries.
//! - Ambiguous local times (fall back) resolve to the earliest instant;
//!   nonexistent local times (spring forward) shift forward to the first
//!   wall-clock time that exists.

use chrono::{
    DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday,
};
use chrono_tz::Tz;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Upper bound on the forward search out of a DST gap. Real gaps are at
/// most one day (Pacific date-line shifts); anything longer means broken
/// zone data and falls back to interpreting the wall clock as UTC.
const MAX_GAP_PROBE_HOURS: i64 = 48;

pub type TzResult<T> = Result<T, TzError>;

/// Errors from timezone resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TzError {
    /// The supplied string is not a known IANA zone identifier.
    UnknownZone(String),
}

impl Display for TzError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownZone(name) => {
                write!(f, "unknown IANA timezone identifier: `{name}`")
            }
        }
    }
}

impl Error for TzError {}

/// Resolves an IANA zone identifier such as `America/New_York`.
pub fn parse_zone(name: &str) -> TzResult<Tz> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| TzError::UnknownZone(name.to_string()))
}

/// Converts a local wall-clock datetime in `zone` to a UTC instant.
pub fn to_utc(local: NaiveDateTime, zone: Tz) -> DateTime<Utc> {
    resolve_local(local, zone)
}

/// Returns the local calendar day containing `instant` in `zone`.
pub fn local_day(instant: DateTime<Utc>, zone: Tz) -> NaiveDate {
    instant.with_timezone(&zone).date_naive()
}

/// Returns the start-of-day instant for the local day containing `instant`.
pub fn day_boundary(instant: DateTime<Utc>, zone: Tz) -> DateTime<Utc> {
    let day = local_day(instant, zone);
    resolve_local(day.and_time(NaiveTime::MIN), zone)
}

/// Combines a local calendar date with a local time-of-day into a UTC
/// instant.
pub fn combine_date_and_time(date: NaiveDate, time: NaiveTime, zone: Tz) -> DateTime<Utc> {
    resolve_local(date.and_time(time), zone)
}

/// Combines a local calendar date with the time-of-day that `pattern`
/// reads as in `zone`. Used to stamp materialized days with an existing
/// entry's feeding time.
pub fn combine_date_and_time_of_day(
    date: NaiveDate,
    pattern: DateTime<Utc>,
    zone: Tz,
) -> DateTime<Utc> {
    let time = pattern.with_timezone(&zone).time();
    combine_date_and_time(date, time, zone)
}

/// Local-noon instant for a date. Fallback time-of-day when no prior
/// entry provides a pattern.
pub fn local_noon(date: NaiveDate, zone: Tz) -> DateTime<Utc> {
    combine_date_and_time(date, NaiveTime::MIN + Duration::hours(12), zone)
}

/// Returns the date of the week start (per `week_start`) for the week
/// containing `anchor`.
pub fn week_start_date(anchor: NaiveDate, week_start: Weekday) -> NaiveDate {
    let days_back = (i64::from(anchor.weekday().num_days_from_monday())
        - i64::from(week_start.num_days_from_monday()))
    .rem_euclid(7);
    anchor - Duration::days(days_back)
}

/// Returns the half-open UTC window `[start, end)` of the 7-day week
/// containing `anchor` in `zone`.
pub fn week_range(anchor: NaiveDate, zone: Tz, week_start: Weekday) -> (DateTime<Utc>, DateTime<Utc>) {
    let start_day = week_start_date(anchor, week_start);
    let end_day = start_day + Duration::days(7);
    (
        combine_date_and_time(start_day, NaiveTime::MIN, zone),
        combine_date_and_time(end_day, NaiveTime::MIN, zone),
    )
}

fn resolve_local(local: NaiveDateTime, zone: Tz) -> DateTime<Utc> {
    let mut probe = local;
    for _ in 0..MAX_GAP_PROBE_HOURS {
        match zone.from_local_datetime(&probe) {
            chrono::LocalResult::Single(instant) => return instant.with_timezone(&Utc),
            chrono::LocalResult::Ambiguous(earliest, _) => {
                return earliest.with_timezone(&Utc);
            }
            chrono::LocalResult::None => probe += Duration::hours(1),
        }
    }
    Utc.from_utc_datetime(&local)
}
