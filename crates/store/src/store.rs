use async_trait::async_trait;
use chrono::{DateTime, Utc};

use toolroom_catalog::{Item, ItemEdit, Project};
use toolroom_core::{ItemId, ProjectId, TenantId};

use crate::error::StoreError;
use crate::query::{EntryFilter, EntryPage, Pagination};
use crate::reconcile::ReconcileReport;
use crate::records::{AllocationView, MovementOutcome, TransactionView};

/// Persistence seam for the catalog and the allocation ledger.
///
/// Every operation is tenant-scoped; implementations must never let one
/// tenant observe or mutate another tenant's rows. Movement operations
/// (`borrow_item`/`return_item`) must apply their three effects atomically.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // ── catalog: items ──────────────────────────────────────────────

    /// Persist a new item. Fails with a conflict if the tenant already has
    /// an item with the same name (case-insensitive).
    async fn create_item(&self, item: Item) -> Result<Item, StoreError>;

    async fn get_item(&self, tenant_id: TenantId, item_id: ItemId)
        -> Result<Option<Item>, StoreError>;

    async fn list_items(&self, tenant_id: TenantId) -> Result<Vec<Item>, StoreError>;

    /// Direct edit of an item (admin action, bypasses the ledger).
    async fn update_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        edit: ItemEdit,
        now: DateTime<Utc>,
    ) -> Result<Item, StoreError>;

    /// Delete an item. Fails with a conflict while any allocation still
    /// references it.
    async fn delete_item(&self, tenant_id: TenantId, item_id: ItemId) -> Result<(), StoreError>;

    // ── catalog: projects ───────────────────────────────────────────

    async fn create_project(&self, project: Project) -> Result<Project, StoreError>;

    async fn get_project(
        &self,
        tenant_id: TenantId,
        project_id: ProjectId,
    ) -> Result<Option<Project>, StoreError>;

    async fn list_projects(&self, tenant_id: TenantId) -> Result<Vec<Project>, StoreError>;

    /// Current allocations of a project, joined with item names.
    async fn project_allocations(
        &self,
        tenant_id: TenantId,
        project_id: ProjectId,
    ) -> Result<Vec<AllocationView>, StoreError>;

    // ── ledger ──────────────────────────────────────────────────────

    /// Move `quantity` units from the item's pool into the project's
    /// allocation and append a ledger entry, as one atomic effect.
    async fn borrow_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        project_id: ProjectId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<MovementOutcome, StoreError>;

    /// Move `quantity` units from the project's allocation back into the
    /// item's pool and append a ledger entry, as one atomic effect.
    async fn return_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        project_id: ProjectId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<MovementOutcome, StoreError>;

    /// Ledger entries for a tenant, newest first.
    async fn list_entries(
        &self,
        tenant_id: TenantId,
        filter: EntryFilter,
        pagination: Pagination,
    ) -> Result<EntryPage, StoreError>;

    /// One ledger entry with its item/project summaries.
    async fn get_entry(
        &self,
        tenant_id: TenantId,
        entry_id: toolroom_core::EntryId,
    ) -> Result<Option<TransactionView>, StoreError>;

    // ── audit ───────────────────────────────────────────────────────

    /// Replay the tenant's ledger and diff it against the materialized
    /// allocation rows.
    async fn reconcile(&self, tenant_id: TenantId) -> Result<ReconcileReport, StoreError>;
}
