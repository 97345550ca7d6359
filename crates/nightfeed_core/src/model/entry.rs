//! Feeding entry domain model.
//!
//! # Responsibility
//! - Define a single scheduled or recorded feeding event.
//!
//! # Invariants
//! - `feeding_time` is an absolute UTC instant; local rendering is the
//!   caller's concern and always goes through the timezone converter.
//! - `volume_ounces`, when set, is >= 0. `None` means not yet recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a feeding entry.
pub type EntryId = Uuid;

/// One scheduled/recorded feeding event inside a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedingEntry {
    /// Stable global ID.
    pub id: EntryId,
    /// Owning block.
    pub block_id: Uuid,
    /// Absolute instant of the feeding, stored in UTC.
    pub feeding_time: DateTime<Utc>,
    /// Recorded volume in ounces. `None` until the user records one.
    pub volume_ounces: Option<f64>,
    /// Whether the feeding was marked done.
    pub completed: bool,
}

/// Validation failures for persisted or to-be-persisted entries.
#[derive(Debug)]
pub enum EntryValidationError {
    NegativeVolume(f64),
}

impl Display for EntryValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NegativeVolume(volume) => {
                write!(f, "entry volume must be >= 0, got {volume}")
            }
        }
    }
}

impl Error for EntryValidationError {}

impl FeedingEntry {
    /// Creates an unrecorded entry at the given instant.
    pub fn new(block_id: Uuid, feeding_time: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            block_id,
            feeding_time,
            volume_ounces: None,
            completed: false,
        }
    }

    /// Checks field-level invariants.
    pub fn validate(&self) -> Result<(), EntryValidationError> {
        if let Some(volume) = self.volume_ounces {
            if !(volume >= 0.0) {
                return Err(EntryValidationError::NegativeVolume(volume));
            }
        }
        Ok(())
    }
}
