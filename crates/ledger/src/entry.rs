use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use toolroom_core::{DomainError, DomainResult, EntryId, ItemId, ProjectId, TenantId};

use crate::movement::Movement;

/// Direction of a ledger movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryAction {
    Borrow,
    Return,
}

impl EntryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryAction::Borrow => "borrow",
            EntryAction::Return => "return",
        }
    }

    pub fn parse(s: &str) -> DomainResult<Self> {
        match s {
            "borrow" => Ok(EntryAction::Borrow),
            "return" => Ok(EntryAction::Return),
            other => Err(DomainError::validation(format!(
                "unknown ledger action '{other}'"
            ))),
        }
    }
}

/// One immutable ledger entry.
///
/// Appended exactly once per successful borrow/return; never updated or
/// deleted through normal operation. `pool_before`/`pool_after` capture the
/// item's pool quantity around the movement so the log's own arithmetic can
/// be audited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: EntryId,
    pub tenant_id: TenantId,
    pub item_id: ItemId,
    pub project_id: ProjectId,
    pub action: EntryAction,
    pub quantity: i64,
    pub pool_before: i64,
    pub pool_after: i64,
    pub recorded_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Record a planned movement as a ledger entry.
    pub fn record(
        tenant_id: TenantId,
        item_id: ItemId,
        project_id: ProjectId,
        movement: &Movement,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            entry_id: EntryId::new(),
            tenant_id,
            item_id,
            project_id,
            action: movement.action,
            quantity: movement.quantity,
            pool_before: movement.pool_before,
            pool_after: movement.pool_after,
            recorded_at,
        }
    }
}
