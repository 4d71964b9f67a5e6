//! Ledger listing parameters and results.
//!
//! All listings are tenant-scoped and paginated by default.

use serde::{Deserialize, Serialize};

use toolroom_core::{ItemId, ProjectId};
use toolroom_ledger::EntryAction;

use crate::records::TransactionView;

/// Pagination parameters for ledger listings.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Pagination {
    /// Maximum number of entries to return.
    pub limit: u32,
    /// Offset for pagination (0-based).
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50).min(1000),
            offset: offset.unwrap_or(0),
        }
    }
}

/// Filter criteria for ledger listings.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryFilter {
    pub item_id: Option<ItemId>,
    pub project_id: Option<ProjectId>,
    pub action: Option<EntryAction>,
}

impl EntryFilter {
    pub fn matches(&self, entry: &toolroom_ledger::LedgerEntry) -> bool {
        self.item_id.is_none_or(|id| entry.item_id == id)
            && self.project_id.is_none_or(|id| entry.project_id == id)
            && self.action.is_none_or(|a| entry.action == a)
    }
}

/// One page of ledger entries, newest first.
#[derive(Debug, Clone)]
pub struct EntryPage {
    pub entries: Vec<TransactionView>,
    /// Total number of entries matching the filter (across all pages).
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}
