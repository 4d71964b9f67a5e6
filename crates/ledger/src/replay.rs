//! Audit replay over the entry log.
//!
//! The ledger is append-only; replaying it rebuilds the allocation side of
//! the conservation law from scratch. Diffing the rebuilt state against the
//! materialized allocation rows detects drift without trusting either side.

use std::collections::HashMap;

use serde::Serialize;

use toolroom_core::{EntryId, ItemId, ProjectId};

use crate::entry::{EntryAction, LedgerEntry};

/// Expected allocation balances derived purely from the log.
///
/// Entries must be supplied in recorded order. Balances that return to zero
/// are dropped (mirroring the no-zero-rows invariant); a negative balance is
/// kept so the diff can surface it; a log can only net negative if entries
/// were lost or tampered with.
pub fn rebuild_allocations(entries: &[LedgerEntry]) -> HashMap<(ProjectId, ItemId), i64> {
    let mut balances: HashMap<(ProjectId, ItemId), i64> = HashMap::new();

    for entry in entries {
        let key = (entry.project_id, entry.item_id);
        let delta = match entry.action {
            EntryAction::Borrow => entry.quantity,
            EntryAction::Return => -entry.quantity,
        };
        let balance = balances.entry(key).or_insert(0);
        *balance += delta;
        if *balance == 0 {
            balances.remove(&key);
        }
    }

    balances
}

/// One disagreement between the replayed log and the materialized rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AllocationDrift {
    pub project_id: ProjectId,
    pub item_id: ItemId,
    /// Balance the log says the allocation should hold (0 = no row).
    pub expected: i64,
    /// Balance the materialized row actually holds (0 = no row).
    pub actual: i64,
}

/// Diff replayed balances against the materialized allocation rows.
pub fn diff_allocations(
    expected: &HashMap<(ProjectId, ItemId), i64>,
    actual: &HashMap<(ProjectId, ItemId), i64>,
) -> Vec<AllocationDrift> {
    let mut drift = Vec::new();

    for (key, expected_qty) in expected {
        let actual_qty = actual.get(key).copied().unwrap_or(0);
        if actual_qty != *expected_qty {
            drift.push(AllocationDrift {
                project_id: key.0,
                item_id: key.1,
                expected: *expected_qty,
                actual: actual_qty,
            });
        }
    }

    for (key, actual_qty) in actual {
        if !expected.contains_key(key) {
            drift.push(AllocationDrift {
                project_id: key.0,
                item_id: key.1,
                expected: 0,
                actual: *actual_qty,
            });
        }
    }

    drift.sort_by_key(|d| (d.project_id, d.item_id));
    drift
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LogBreakKind {
    /// An entry's own arithmetic is wrong (`pool_after` does not follow from
    /// `pool_before` and the action). Always drift.
    Arithmetic,
    /// Consecutive entries for an item do not chain (`pool_before` differs
    /// from the previous `pool_after`). Expected when the pool was edited
    /// directly between movements; informational.
    Gap,
}

/// A point where the log's pool bookkeeping does not line up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogBreak {
    pub kind: LogBreakKind,
    pub item_id: ItemId,
    pub entry_id: EntryId,
    pub detail: String,
}

/// Audit the pool arithmetic recorded in the log itself.
///
/// Entries must be supplied in recorded order.
pub fn check_log(entries: &[LedgerEntry]) -> Vec<LogBreak> {
    let mut breaks = Vec::new();
    let mut last_pool: HashMap<ItemId, i64> = HashMap::new();

    for entry in entries {
        let expected_after = match entry.action {
            EntryAction::Borrow => entry.pool_before - entry.quantity,
            EntryAction::Return => entry.pool_before + entry.quantity,
        };
        if entry.pool_after != expected_after {
            breaks.push(LogBreak {
                kind: LogBreakKind::Arithmetic,
                item_id: entry.item_id,
                entry_id: entry.entry_id,
                detail: format!(
                    "{} of {} recorded pool {} -> {}, expected {}",
                    entry.action.as_str(),
                    entry.quantity,
                    entry.pool_before,
                    entry.pool_after,
                    expected_after
                ),
            });
        }

        if let Some(prev_after) = last_pool.get(&entry.item_id) {
            if entry.pool_before != *prev_after {
                breaks.push(LogBreak {
                    kind: LogBreakKind::Gap,
                    item_id: entry.item_id,
                    entry_id: entry.entry_id,
                    detail: format!(
                        "pool was {} after the previous entry but {} before this one",
                        prev_after, entry.pool_before
                    ),
                });
            }
        }
        last_pool.insert(entry.item_id, entry.pool_after);
    }

    breaks
}
