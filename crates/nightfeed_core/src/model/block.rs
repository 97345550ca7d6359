//! Feeding block domain model.
//!
//! # Responsibility
//! - Define the per-user ordered grouping of feeding entries.
//! - Carry the elimination (weaning) reference point for volume math.
//!
//! # Invariants
//! - `number` values for one user form a dense 1..N sequence; the engine
//!   renumbers siblings on delete to preserve this.
//! - If `elimination_start` is set, `baseline_volume` is set and >= 0.
//! - `current_group` is the group index of the last baseline rebase, >= 0.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Stable identifier for a feeding block.
pub type BlockId = Uuid;

/// Ordered, per-user grouping of feeding entries, optionally in an
/// eliminating (weaning) phase.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedingBlock {
    /// Stable global ID.
    pub id: BlockId,
    /// Owner key.
    pub username: String,
    /// 1-based position among the owner's blocks, dense, no gaps.
    pub number: i64,
    /// Whether volumes on this block follow the elimination glide path.
    pub is_eliminating: bool,
    /// Instant the elimination phase started. Unset until the first
    /// elimination volume is recorded or elimination is started explicitly.
    pub elimination_start: Option<DateTime<Utc>>,
    /// Reference volume in ounces for the current glide path.
    pub baseline_volume: Option<f64>,
    /// Group index at which `baseline_volume` was last anchored.
    pub current_group: i64,
}

/// Validation failures for persisted or to-be-persisted blocks.
#[derive(Debug)]
pub enum BlockValidationError {
    BlankUsername,
    InvalidNumber(i64),
    NegativeGroup(i64),
    NegativeBaseline(f64),
    /// `elimination_start` is set without a baseline volume.
    MissingBaseline,
}

impl Display for BlockValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankUsername => write!(f, "block username must not be blank"),
            Self::InvalidNumber(number) => {
                write!(f, "block number must be >= 1, got {number}")
            }
            Self::NegativeGroup(group) => {
                write!(f, "block current_group must be >= 0, got {group}")
            }
            Self::NegativeBaseline(volume) => {
                write!(f, "block baseline volume must be >= 0, got {volume}")
            }
            Self::MissingBaseline => write!(
                f,
                "block with an elimination start must carry a baseline volume"
            ),
        }
    }
}

impl Error for BlockValidationError {}

impl FeedingBlock {
    /// Creates a block at the given position with elimination fields unset.
    pub fn new(username: impl Into<String>, number: i64, is_eliminating: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            username: username.into(),
            number,
            is_eliminating,
            elimination_start: None,
            baseline_volume: None,
            current_group: 0,
        }
    }

    /// Checks field-level invariants.
    pub fn validate(&self) -> Result<(), BlockValidationError> {
        if self.username.trim().is_empty() {
            return Err(BlockValidationError::BlankUsername);
        }
        if self.number < 1 {
            return Err(BlockValidationError::InvalidNumber(self.number));
        }
        if self.current_group < 0 {
            return Err(BlockValidationError::NegativeGroup(self.current_group));
        }
        match (self.elimination_start, self.baseline_volume) {
            (Some(_), None) => return Err(BlockValidationError::MissingBaseline),
            (_, Some(volume)) if !(volume >= 0.0) => {
                return Err(BlockValidationError::NegativeBaseline(volume));
            }
            _ => {}
        }
        Ok(())
    }
}
