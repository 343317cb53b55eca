//! Form-tree domain model.
//!
//! # Responsibility
//! - Define canonical records for trees and their nodes.
//! - Keep the flat, repository-shaped representation authoritative.
//!
//! # Invariants
//! - Every record is identified by a stable UUID.
//! - Hierarchical views are derived from `parent_id`, never stored.

pub mod node;
pub mod tree;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current wall clock in epoch milliseconds. Falls back to `0` when the clock
/// is before the epoch.
pub(crate) fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as i64)
}
