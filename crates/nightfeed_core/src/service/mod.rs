//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into schedule-level operations.
//! - Own the transaction boundaries of multi-row mutations.

pub mod schedule;
