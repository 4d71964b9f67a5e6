//! In-memory backend (dev/test).
//!
//! One mutex guards the whole tenant state, which makes every operation
//! (including the three-effect movements) trivially atomic and serialized.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use toolroom_catalog::{Item, ItemEdit, Project};
use toolroom_core::{DomainError, EntryId, ItemId, ProjectId, TenantId};
use toolroom_ledger::{plan_borrow, plan_return, Allocation, EntryAction, LedgerEntry};

use crate::error::StoreError;
use crate::query::{EntryFilter, EntryPage, Pagination};
use crate::reconcile::{build_report, ReconcileReport};
use crate::records::{AllocationView, ItemSummary, MovementOutcome, ProjectSummary, TransactionView};
use crate::store::LedgerStore;

#[derive(Default)]
struct State {
    items: HashMap<(TenantId, ItemId), Item>,
    projects: HashMap<(TenantId, ProjectId), Project>,
    allocations: HashMap<(TenantId, ProjectId, ItemId), i64>,
    entries: Vec<LedgerEntry>,
}

#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn view_for(state: &State, entry: &LedgerEntry) -> TransactionView {
        let item = state
            .items
            .get(&(entry.tenant_id, entry.item_id))
            .map(|i| ItemSummary {
                item_id: i.item_id,
                name: i.name.clone(),
            });
        let project = state
            .projects
            .get(&(entry.tenant_id, entry.project_id))
            .map(|p| ProjectSummary {
                project_id: p.project_id,
                name: p.name.clone(),
                status: p.status,
            });
        TransactionView {
            entry: entry.clone(),
            item,
            project,
        }
    }

    fn apply_movement(
        state: &mut State,
        tenant_id: TenantId,
        item_id: ItemId,
        project_id: ProjectId,
        quantity: i64,
        action: EntryAction,
        now: DateTime<Utc>,
    ) -> Result<MovementOutcome, StoreError> {
        if !state.projects.contains_key(&(tenant_id, project_id)) {
            return Err(StoreError::not_found());
        }

        let item = state
            .items
            .get(&(tenant_id, item_id))
            .ok_or(DomainError::NotFound)?;

        let held = state
            .allocations
            .get(&(tenant_id, project_id, item_id))
            .copied()
            .unwrap_or(0);
        let allocation = Allocation::from_quantity(held).map_err(DomainError::from)?;

        let movement = match action {
            EntryAction::Borrow => plan_borrow(item.quantity, allocation, quantity)?,
            EntryAction::Return => plan_return(item.quantity, allocation, quantity)?,
        };

        // All three effects happen under the same lock acquisition.
        let item = state
            .items
            .get_mut(&(tenant_id, item_id))
            .ok_or(DomainError::NotFound)?;
        item.quantity = movement.pool_after;
        item.updated_at = now;
        let item = item.clone();

        match movement.allocation_after {
            Allocation::Allocated(q) => {
                state.allocations.insert((tenant_id, project_id, item_id), q);
            }
            Allocation::Unallocated => {
                state.allocations.remove(&(tenant_id, project_id, item_id));
            }
        }

        let entry = LedgerEntry::record(tenant_id, item_id, project_id, &movement, now);
        state.entries.push(entry.clone());

        Ok(MovementOutcome { entry, item })
    }
}

#[async_trait]
impl LedgerStore for InMemoryStore {
    async fn create_item(&self, item: Item) -> Result<Item, StoreError> {
        let mut state = self.state.lock().unwrap();
        let duplicate = state
            .items
            .values()
            .any(|i| i.tenant_id == item.tenant_id && i.name_key() == item.name_key());
        if duplicate {
            return Err(DomainError::conflict(format!(
                "an item named '{}' already exists",
                item.name
            ))
            .into());
        }
        state.items.insert((item.tenant_id, item.item_id), item.clone());
        Ok(item)
    }

    async fn get_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Result<Option<Item>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.items.get(&(tenant_id, item_id)).cloned())
    }

    async fn list_items(&self, tenant_id: TenantId) -> Result<Vec<Item>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut items: Vec<Item> = state
            .items
            .values()
            .filter(|i| i.tenant_id == tenant_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.name_key().cmp(&b.name_key()));
        Ok(items)
    }

    async fn update_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        edit: ItemEdit,
        now: DateTime<Utc>,
    ) -> Result<Item, StoreError> {
        let mut state = self.state.lock().unwrap();

        let mut updated = state
            .items
            .get(&(tenant_id, item_id))
            .cloned()
            .ok_or(DomainError::NotFound)?;
        updated.apply_edit(edit, now)?;

        let duplicate = state.items.values().any(|i| {
            i.tenant_id == tenant_id && i.item_id != item_id && i.name_key() == updated.name_key()
        });
        if duplicate {
            return Err(DomainError::conflict(format!(
                "an item named '{}' already exists",
                updated.name
            ))
            .into());
        }

        state.items.insert((tenant_id, item_id), updated.clone());
        Ok(updated)
    }

    async fn delete_item(&self, tenant_id: TenantId, item_id: ItemId) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if !state.items.contains_key(&(tenant_id, item_id)) {
            return Err(StoreError::not_found());
        }
        let referenced = state
            .allocations
            .keys()
            .any(|(t, _, i)| *t == tenant_id && *i == item_id);
        if referenced {
            return Err(
                DomainError::conflict("item still has open allocations").into(),
            );
        }
        state.items.remove(&(tenant_id, item_id));
        Ok(())
    }

    async fn create_project(&self, project: Project) -> Result<Project, StoreError> {
        let mut state = self.state.lock().unwrap();
        state
            .projects
            .insert((project.tenant_id, project.project_id), project.clone());
        Ok(project)
    }

    async fn get_project(
        &self,
        tenant_id: TenantId,
        project_id: ProjectId,
    ) -> Result<Option<Project>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.projects.get(&(tenant_id, project_id)).cloned())
    }

    async fn list_projects(&self, tenant_id: TenantId) -> Result<Vec<Project>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut projects: Vec<Project> = state
            .projects
            .values()
            .filter(|p| p.tenant_id == tenant_id)
            .cloned()
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(projects)
    }

    async fn project_allocations(
        &self,
        tenant_id: TenantId,
        project_id: ProjectId,
    ) -> Result<Vec<AllocationView>, StoreError> {
        let state = self.state.lock().unwrap();
        if !state.projects.contains_key(&(tenant_id, project_id)) {
            return Err(StoreError::not_found());
        }
        let mut views: Vec<AllocationView> = state
            .allocations
            .iter()
            .filter(|((t, p, _), _)| *t == tenant_id && *p == project_id)
            .map(|((_, _, item_id), quantity)| AllocationView {
                item_id: *item_id,
                item_name: state
                    .items
                    .get(&(tenant_id, *item_id))
                    .map(|i| i.name.clone())
                    .unwrap_or_default(),
                quantity: *quantity,
            })
            .collect();
        views.sort_by(|a, b| a.item_name.cmp(&b.item_name));
        Ok(views)
    }

    async fn borrow_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        project_id: ProjectId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<MovementOutcome, StoreError> {
        let mut state = self.state.lock().unwrap();
        Self::apply_movement(
            &mut state,
            tenant_id,
            item_id,
            project_id,
            quantity,
            EntryAction::Borrow,
            now,
        )
    }

    async fn return_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        project_id: ProjectId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<MovementOutcome, StoreError> {
        let mut state = self.state.lock().unwrap();
        Self::apply_movement(
            &mut state,
            tenant_id,
            item_id,
            project_id,
            quantity,
            EntryAction::Return,
            now,
        )
    }

    async fn list_entries(
        &self,
        tenant_id: TenantId,
        filter: EntryFilter,
        pagination: Pagination,
    ) -> Result<EntryPage, StoreError> {
        let state = self.state.lock().unwrap();

        let mut matching: Vec<&LedgerEntry> = state
            .entries
            .iter()
            .filter(|e| e.tenant_id == tenant_id && filter.matches(e))
            .collect();
        // Newest first; entry ids are time-ordered and break timestamp ties.
        matching.sort_by(|a, b| {
            b.recorded_at
                .cmp(&a.recorded_at)
                .then(b.entry_id.as_uuid().cmp(a.entry_id.as_uuid()))
        });

        let total = matching.len() as u64;
        let entries: Vec<TransactionView> = matching
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .map(|e| Self::view_for(&state, e))
            .collect();
        let has_more = (pagination.offset as u64 + entries.len() as u64) < total;

        Ok(EntryPage {
            entries,
            total,
            pagination,
            has_more,
        })
    }

    async fn get_entry(
        &self,
        tenant_id: TenantId,
        entry_id: EntryId,
    ) -> Result<Option<TransactionView>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .entries
            .iter()
            .find(|e| e.tenant_id == tenant_id && e.entry_id == entry_id)
            .map(|e| Self::view_for(&state, e)))
    }

    async fn reconcile(&self, tenant_id: TenantId) -> Result<ReconcileReport, StoreError> {
        let state = self.state.lock().unwrap();

        let mut entries: Vec<LedgerEntry> = state
            .entries
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            a.recorded_at
                .cmp(&b.recorded_at)
                .then(a.entry_id.as_uuid().cmp(b.entry_id.as_uuid()))
        });

        let materialized: HashMap<(ProjectId, ItemId), i64> = state
            .allocations
            .iter()
            .filter(|((t, _, _), _)| *t == tenant_id)
            .map(|((_, p, i), q)| ((*p, *i), *q))
            .collect();

        Ok(build_report(tenant_id, &entries, &materialized))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store_with_item(quantity: i64) -> (InMemoryStore, TenantId, ItemId, ProjectId) {
        let store = InMemoryStore::new();
        let tenant_id = TenantId::new();
        let now = Utc::now();

        let item = Item::new(tenant_id, ItemId::new(), "Ladder", None, quantity, now).unwrap();
        let project = Project::new(tenant_id, ProjectId::new(), "Site A", None, now).unwrap();
        let (item_id, project_id) = (item.item_id, project.project_id);

        store.create_item(item).await.unwrap();
        store.create_project(project).await.unwrap();

        (store, tenant_id, item_id, project_id)
    }

    #[tokio::test]
    async fn borrow_then_return_round_trips() {
        let (store, tenant, item_id, project_id) = store_with_item(10).await;
        let now = Utc::now();

        let borrowed = store
            .borrow_item(tenant, item_id, project_id, 4, now)
            .await
            .unwrap();
        assert_eq!(borrowed.item.quantity, 6);
        assert_eq!(borrowed.entry.action, EntryAction::Borrow);

        let allocs = store.project_allocations(tenant, project_id).await.unwrap();
        assert_eq!(allocs.len(), 1);
        assert_eq!(allocs[0].quantity, 4);

        let returned = store
            .return_item(tenant, item_id, project_id, 4, now)
            .await
            .unwrap();
        assert_eq!(returned.item.quantity, 10);

        // Returning the last unit dissolves the allocation row.
        let allocs = store.project_allocations(tenant, project_id).await.unwrap();
        assert!(allocs.is_empty());
    }

    #[tokio::test]
    async fn rejected_movements_change_nothing() {
        let (store, tenant, item_id, project_id) = store_with_item(3).await;
        let now = Utc::now();

        let err = store
            .borrow_item(tenant, item_id, project_id, 5, now)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(DomainError::InvariantViolation(_))
        ));

        let item = store.get_item(tenant, item_id).await.unwrap().unwrap();
        assert_eq!(item.quantity, 3);
        let page = store
            .list_entries(tenant, EntryFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 0);
    }

    #[tokio::test]
    async fn over_return_is_rejected() {
        let (store, tenant, item_id, project_id) = store_with_item(10).await;
        let now = Utc::now();

        store
            .borrow_item(tenant, item_id, project_id, 2, now)
            .await
            .unwrap();
        let err = store
            .return_item(tenant, item_id, project_id, 5, now)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Domain(DomainError::InvariantViolation(_))
        ));

        let allocs = store.project_allocations(tenant, project_id).await.unwrap();
        assert_eq!(allocs[0].quantity, 2);
    }

    #[tokio::test]
    async fn every_movement_appends_exactly_one_entry() {
        let (store, tenant, item_id, project_id) = store_with_item(10).await;
        let now = Utc::now();

        store
            .borrow_item(tenant, item_id, project_id, 4, now)
            .await
            .unwrap();
        store
            .return_item(tenant, item_id, project_id, 1, now)
            .await
            .unwrap();

        let page = store
            .list_entries(tenant, EntryFilter::default(), Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.total, 2);

        let borrows = store
            .list_entries(
                tenant,
                EntryFilter {
                    action: Some(EntryAction::Borrow),
                    ..Default::default()
                },
                Pagination::default(),
            )
            .await
            .unwrap();
        assert_eq!(borrows.total, 1);
    }

    #[tokio::test]
    async fn cross_tenant_ids_look_missing() {
        let (store, _tenant, item_id, project_id) = store_with_item(10).await;
        let other = TenantId::new();
        let now = Utc::now();

        // The other tenant needs its own project for the lookup to even
        // reach the item check.
        let project = Project::new(other, project_id.as_uuid().to_owned().into(), "X", None, now)
            .unwrap();
        store.create_project(project).await.unwrap();

        let err = store
            .borrow_item(other, item_id, project_id, 1, now)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::NotFound)));
    }

    #[tokio::test]
    async fn delete_blocked_while_allocated() {
        let (store, tenant, item_id, project_id) = store_with_item(10).await;
        let now = Utc::now();

        store
            .borrow_item(tenant, item_id, project_id, 1, now)
            .await
            .unwrap();
        let err = store.delete_item(tenant, item_id).await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Conflict(_))));

        store
            .return_item(tenant, item_id, project_id, 1, now)
            .await
            .unwrap();
        store.delete_item(tenant, item_id).await.unwrap();
    }

    #[tokio::test]
    async fn duplicate_names_conflict_case_insensitively() {
        let (store, tenant, _item_id, _project_id) = store_with_item(1).await;
        let dup = Item::new(tenant, ItemId::new(), "LADDER", None, 0, Utc::now()).unwrap();
        let err = store.create_item(dup).await.unwrap_err();
        assert!(matches!(err, StoreError::Domain(DomainError::Conflict(_))));
    }

    #[tokio::test]
    async fn reconcile_is_clean_after_normal_operation() {
        let (store, tenant, item_id, project_id) = store_with_item(10).await;
        let now = Utc::now();

        store
            .borrow_item(tenant, item_id, project_id, 4, now)
            .await
            .unwrap();
        store
            .return_item(tenant, item_id, project_id, 2, now)
            .await
            .unwrap();

        let report = store.reconcile(tenant).await.unwrap();
        assert!(report.is_clean());
        assert_eq!(report.entries_replayed, 2);
    }
}
