//! Elimination (weaning) glide-path arithmetic.
//!
//! # Responsibility
//! - Pure volume/group math for eliminating blocks; no I/O.
//!
//! # Invariants
//! - Day counts floor both instants to local midnight in the caller's
//!   zone before subtracting, so same-day instants always yield 0 and
//!   time-of-day noise never produces a negative group.
//! - Expected volumes never go below zero.
//! - Group indexes passed to `expected_volume` are measured relative to
//!   the block's last rebase anchor; the anchor group itself always reads
//!   the baseline verbatim.

use crate::tz;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Counts whole local calendar days between two instants in `zone`.
///
/// Negative when `end` falls on an earlier local day than `start`.
pub fn days_between(start: DateTime<Utc>, end: DateTime<Utc>, zone: Tz) -> i64 {
    let start_day = tz::local_day(start, zone);
    let end_day = tz::local_day(end, zone);
    end_day.signed_duration_since(start_day).num_days()
}

/// Maps a non-negative day count since elimination start onto its group
/// index. Volume is constant within a group.
pub fn group_number(days_since_start: i64, group_days: i64) -> i64 {
    days_since_start.div_euclid(group_days)
}

/// Expected volume after `groups_since_rebase` whole groups of decrement,
/// clamped at zero.
pub fn expected_volume(baseline: f64, groups_since_rebase: i64, decrement: f64) -> f64 {
    (baseline - groups_since_rebase as f64 * decrement).max(0.0)
}
