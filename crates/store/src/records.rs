use toolroom_catalog::{Item, ProjectStatus};
use toolroom_core::{ItemId, ProjectId};
use toolroom_ledger::LedgerEntry;

/// Item fields joined onto ledger views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemSummary {
    pub item_id: ItemId,
    pub name: String,
}

/// Project fields joined onto ledger views.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSummary {
    pub project_id: ProjectId,
    pub name: String,
    pub status: ProjectStatus,
}

/// A ledger entry joined with its item/project summaries.
///
/// The summaries are optional because the log outlives the catalog: entries
/// keep referring to items deleted after their allocations were returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionView {
    pub entry: LedgerEntry,
    pub item: Option<ItemSummary>,
    pub project: Option<ProjectSummary>,
}

/// One materialized allocation row, joined with the item name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationView {
    pub item_id: ItemId,
    pub item_name: String,
    pub quantity: i64,
}

/// Result of a successful borrow/return: the appended entry plus the item's
/// post-movement state, returned for caller-side verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementOutcome {
    pub entry: LedgerEntry,
    pub item: Item,
}
