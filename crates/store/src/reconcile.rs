//! Tenant-scoped reconciliation between the ledger log and the materialized
//! allocation rows.

use std::collections::HashMap;

use toolroom_core::{ItemId, ProjectId, TenantId};
use toolroom_ledger::{check_log, diff_allocations, rebuild_allocations, AllocationDrift,
    LedgerEntry, LogBreak};

/// Outcome of replaying a tenant's ledger against its materialized state.
///
/// Reporting only: repair stays a manual operation informed by the report.
#[derive(Debug, Clone)]
pub struct ReconcileReport {
    pub tenant_id: TenantId,
    pub entries_replayed: u64,
    pub allocation_drift: Vec<AllocationDrift>,
    pub log_breaks: Vec<LogBreak>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.allocation_drift.is_empty() && self.log_breaks.is_empty()
    }
}

/// Build a report from a tenant's full entry log (in recorded order) and its
/// current allocation rows.
pub fn build_report(
    tenant_id: TenantId,
    entries: &[LedgerEntry],
    materialized: &HashMap<(ProjectId, ItemId), i64>,
) -> ReconcileReport {
    let expected = rebuild_allocations(entries);
    ReconcileReport {
        tenant_id,
        entries_replayed: entries.len() as u64,
        allocation_drift: diff_allocations(&expected, materialized),
        log_breaks: check_log(entries),
    }
}
