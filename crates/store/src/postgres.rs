//! Postgres backend.
//!
//! Movements run inside a single database transaction: the item row (and the
//! allocation row, when present) is locked with `FOR UPDATE` before the
//! availability check, so two concurrent movements against the same item
//! serialize and cannot over-draw the pool. Any failure rolls the whole
//! movement back.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;

use toolroom_catalog::{Item, ItemEdit, Project, ProjectStatus};
use toolroom_core::{DomainError, EntryId, ItemId, ProjectId, TenantId, UserId};
use toolroom_ledger::{plan_borrow, plan_return, Allocation, EntryAction, LedgerEntry};

use crate::error::StoreError;
use crate::query::{EntryFilter, EntryPage, Pagination};
use crate::reconcile::{build_report, ReconcileReport};
use crate::records::{AllocationView, ItemSummary, MovementOutcome, ProjectSummary, TransactionView};
use crate::store::LedgerStore;

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and run embedded migrations.
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn apply_movement(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        project_id: ProjectId,
        quantity: i64,
        action: EntryAction,
        now: DateTime<Utc>,
    ) -> Result<MovementOutcome, StoreError> {
        let mut tx = self.pool.begin().await?;

        let project = sqlx::query("SELECT 1 FROM projects WHERE tenant_id = $1 AND project_id = $2")
            .bind(tenant_id.as_uuid())
            .bind(project_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;
        if project.is_none() {
            return Err(StoreError::not_found());
        }

        let row = sqlx::query(
            r#"
            SELECT item_id, tenant_id, name, description, quantity, created_at, updated_at
            FROM items
            WHERE tenant_id = $1 AND item_id = $2
            FOR UPDATE
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(item_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        let mut item = match row {
            Some(row) => item_from_row(&row)?,
            None => return Err(StoreError::not_found()),
        };

        let held: i64 = sqlx::query(
            r#"
            SELECT quantity FROM project_inventory
            WHERE tenant_id = $1 AND project_id = $2 AND item_id = $3
            FOR UPDATE
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(project_id.as_uuid())
        .bind(item_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?
        .map(|row| row.try_get("quantity"))
        .transpose()?
        .unwrap_or(0);

        let allocation = Allocation::from_quantity(held)?;
        let movement = match action {
            EntryAction::Borrow => plan_borrow(item.quantity, allocation, quantity)?,
            EntryAction::Return => plan_return(item.quantity, allocation, quantity)?,
        };

        sqlx::query(
            "UPDATE items SET quantity = $3, updated_at = $4 WHERE tenant_id = $1 AND item_id = $2",
        )
        .bind(tenant_id.as_uuid())
        .bind(item_id.as_uuid())
        .bind(movement.pool_after)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        match movement.allocation_after {
            Allocation::Allocated(q) => {
                sqlx::query(
                    r#"
                    INSERT INTO project_inventory (tenant_id, project_id, item_id, quantity, updated_at)
                    VALUES ($1, $2, $3, $4, $5)
                    ON CONFLICT (tenant_id, project_id, item_id)
                    DO UPDATE SET quantity = EXCLUDED.quantity, updated_at = EXCLUDED.updated_at
                    "#,
                )
                .bind(tenant_id.as_uuid())
                .bind(project_id.as_uuid())
                .bind(item_id.as_uuid())
                .bind(q)
                .bind(now)
                .execute(&mut *tx)
                .await?;
            }
            Allocation::Unallocated => {
                sqlx::query(
                    "DELETE FROM project_inventory WHERE tenant_id = $1 AND project_id = $2 AND item_id = $3",
                )
                .bind(tenant_id.as_uuid())
                .bind(project_id.as_uuid())
                .bind(item_id.as_uuid())
                .execute(&mut *tx)
                .await?;
            }
        }

        let entry = LedgerEntry::record(tenant_id, item_id, project_id, &movement, now);
        sqlx::query(
            r#"
            INSERT INTO ledger_entries
                (entry_id, tenant_id, item_id, project_id, action, quantity, pool_before, pool_after, recorded_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(entry.entry_id.as_uuid())
        .bind(entry.tenant_id.as_uuid())
        .bind(entry.item_id.as_uuid())
        .bind(entry.project_id.as_uuid())
        .bind(entry.action.as_str())
        .bind(entry.quantity)
        .bind(entry.pool_before)
        .bind(entry.pool_after)
        .bind(entry.recorded_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        item.quantity = movement.pool_after;
        item.updated_at = now;
        Ok(MovementOutcome { entry, item })
    }
}

#[async_trait]
impl LedgerStore for PgStore {
    async fn create_item(&self, item: Item) -> Result<Item, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO items (item_id, tenant_id, name, description, quantity, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(item.item_id.as_uuid())
        .bind(item.tenant_id.as_uuid())
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_unique_name(e, &item.name))?;
        Ok(item)
    }

    async fn get_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
    ) -> Result<Option<Item>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT item_id, tenant_id, name, description, quantity, created_at, updated_at
            FROM items
            WHERE tenant_id = $1 AND item_id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(item_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| item_from_row(&row)).transpose().map_err(Into::into)
    }

    async fn list_items(&self, tenant_id: TenantId) -> Result<Vec<Item>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT item_id, tenant_id, name, description, quantity, created_at, updated_at
            FROM items
            WHERE tenant_id = $1
            ORDER BY lower(name)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(item_from_row).collect::<Result<_, _>>().map_err(Into::into)
    }

    async fn update_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        edit: ItemEdit,
        now: DateTime<Utc>,
    ) -> Result<Item, StoreError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            SELECT item_id, tenant_id, name, description, quantity, created_at, updated_at
            FROM items
            WHERE tenant_id = $1 AND item_id = $2
            FOR UPDATE
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(item_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        let mut item = match row {
            Some(row) => item_from_row(&row)?,
            None => return Err(StoreError::not_found()),
        };
        item.apply_edit(edit, now)?;

        sqlx::query(
            r#"
            UPDATE items SET name = $3, description = $4, quantity = $5, updated_at = $6
            WHERE tenant_id = $1 AND item_id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(item_id.as_uuid())
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.quantity)
        .bind(item.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_name(e, &item.name))?;

        tx.commit().await?;
        Ok(item)
    }

    async fn delete_item(&self, tenant_id: TenantId, item_id: ItemId) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        let exists =
            sqlx::query("SELECT 1 FROM items WHERE tenant_id = $1 AND item_id = $2 FOR UPDATE")
                .bind(tenant_id.as_uuid())
                .bind(item_id.as_uuid())
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Err(StoreError::not_found());
        }

        let referenced = sqlx::query(
            "SELECT 1 FROM project_inventory WHERE tenant_id = $1 AND item_id = $2 LIMIT 1",
        )
        .bind(tenant_id.as_uuid())
        .bind(item_id.as_uuid())
        .fetch_optional(&mut *tx)
        .await?;
        if referenced.is_some() {
            return Err(DomainError::conflict("item still has open allocations").into());
        }

        sqlx::query("DELETE FROM items WHERE tenant_id = $1 AND item_id = $2")
            .bind(tenant_id.as_uuid())
            .bind(item_id.as_uuid())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn create_project(&self, project: Project) -> Result<Project, StoreError> {
        sqlx::query(
            r#"
            INSERT INTO projects (project_id, tenant_id, name, client_id, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(project.project_id.as_uuid())
        .bind(project.tenant_id.as_uuid())
        .bind(&project.name)
        .bind(project.client_id.map(|c| *c.as_uuid()))
        .bind(project.status.as_str())
        .bind(project.created_at)
        .bind(project.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(project)
    }

    async fn get_project(
        &self,
        tenant_id: TenantId,
        project_id: ProjectId,
    ) -> Result<Option<Project>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT project_id, tenant_id, name, client_id, status, created_at, updated_at
            FROM projects
            WHERE tenant_id = $1 AND project_id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(project_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| project_from_row(&row)).transpose().map_err(Into::into)
    }

    async fn list_projects(&self, tenant_id: TenantId) -> Result<Vec<Project>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT project_id, tenant_id, name, client_id, status, created_at, updated_at
            FROM projects
            WHERE tenant_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(project_from_row)
            .collect::<Result<_, _>>()
            .map_err(Into::into)
    }

    async fn project_allocations(
        &self,
        tenant_id: TenantId,
        project_id: ProjectId,
    ) -> Result<Vec<AllocationView>, StoreError> {
        let project = sqlx::query("SELECT 1 FROM projects WHERE tenant_id = $1 AND project_id = $2")
            .bind(tenant_id.as_uuid())
            .bind(project_id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        if project.is_none() {
            return Err(StoreError::not_found());
        }

        let rows = sqlx::query(
            r#"
            SELECT pi.item_id, pi.quantity, COALESCE(i.name, '') AS item_name
            FROM project_inventory pi
            LEFT JOIN items i ON i.tenant_id = pi.tenant_id AND i.item_id = pi.item_id
            WHERE pi.tenant_id = $1 AND pi.project_id = $2
            ORDER BY item_name
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(project_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(AllocationView {
                    item_id: ItemId::from_uuid(row.try_get("item_id")?),
                    item_name: row.try_get("item_name")?,
                    quantity: row.try_get("quantity")?,
                })
            })
            .collect::<Result<_, sqlx::Error>>()
            .map_err(Into::into)
    }

    async fn borrow_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        project_id: ProjectId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<MovementOutcome, StoreError> {
        self.apply_movement(tenant_id, item_id, project_id, quantity, EntryAction::Borrow, now)
            .await
    }

    async fn return_item(
        &self,
        tenant_id: TenantId,
        item_id: ItemId,
        project_id: ProjectId,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> Result<MovementOutcome, StoreError> {
        self.apply_movement(tenant_id, item_id, project_id, quantity, EntryAction::Return, now)
            .await
    }

    async fn list_entries(
        &self,
        tenant_id: TenantId,
        filter: EntryFilter,
        pagination: Pagination,
    ) -> Result<EntryPage, StoreError> {
        let item_filter: Option<Uuid> = filter.item_id.map(|i| *i.as_uuid());
        let project_filter: Option<Uuid> = filter.project_id.map(|p| *p.as_uuid());
        let action_filter: Option<&str> = filter.action.map(|a| a.as_str());

        let total: i64 = sqlx::query(
            r#"
            SELECT COUNT(*) AS total
            FROM ledger_entries e
            WHERE e.tenant_id = $1
              AND ($2::uuid IS NULL OR e.item_id = $2)
              AND ($3::uuid IS NULL OR e.project_id = $3)
              AND ($4::text IS NULL OR e.action = $4)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(item_filter)
        .bind(project_filter)
        .bind(action_filter)
        .fetch_one(&self.pool)
        .await?
        .try_get("total")?;

        let rows = sqlx::query(
            r#"
            SELECT e.entry_id, e.tenant_id, e.item_id, e.project_id, e.action, e.quantity,
                   e.pool_before, e.pool_after, e.recorded_at,
                   i.name AS item_name, p.name AS project_name, p.status AS project_status
            FROM ledger_entries e
            LEFT JOIN items i ON i.tenant_id = e.tenant_id AND i.item_id = e.item_id
            LEFT JOIN projects p ON p.tenant_id = e.tenant_id AND p.project_id = e.project_id
            WHERE e.tenant_id = $1
              AND ($2::uuid IS NULL OR e.item_id = $2)
              AND ($3::uuid IS NULL OR e.project_id = $3)
              AND ($4::text IS NULL OR e.action = $4)
            ORDER BY e.recorded_at DESC, e.entry_id DESC
            LIMIT $5 OFFSET $6
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(item_filter)
        .bind(project_filter)
        .bind(action_filter)
        .bind(pagination.limit as i64)
        .bind(pagination.offset as i64)
        .fetch_all(&self.pool)
        .await?;

        let entries: Vec<TransactionView> = rows
            .iter()
            .map(view_from_row)
            .collect::<Result<_, sqlx::Error>>()?;
        let has_more = (pagination.offset as u64 + entries.len() as u64) < total as u64;

        Ok(EntryPage {
            entries,
            total: total as u64,
            pagination,
            has_more,
        })
    }

    async fn get_entry(
        &self,
        tenant_id: TenantId,
        entry_id: EntryId,
    ) -> Result<Option<TransactionView>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT e.entry_id, e.tenant_id, e.item_id, e.project_id, e.action, e.quantity,
                   e.pool_before, e.pool_after, e.recorded_at,
                   i.name AS item_name, p.name AS project_name, p.status AS project_status
            FROM ledger_entries e
            LEFT JOIN items i ON i.tenant_id = e.tenant_id AND i.item_id = e.item_id
            LEFT JOIN projects p ON p.tenant_id = e.tenant_id AND p.project_id = e.project_id
            WHERE e.tenant_id = $1 AND e.entry_id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(entry_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| view_from_row(&row)).transpose().map_err(Into::into)
    }

    async fn reconcile(&self, tenant_id: TenantId) -> Result<ReconcileReport, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT entry_id, tenant_id, item_id, project_id, action, quantity,
                   pool_before, pool_after, recorded_at
            FROM ledger_entries
            WHERE tenant_id = $1
            ORDER BY recorded_at ASC, entry_id ASC
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        let entries: Vec<LedgerEntry> = rows
            .iter()
            .map(entry_from_row)
            .collect::<Result<_, sqlx::Error>>()?;

        let rows = sqlx::query(
            "SELECT project_id, item_id, quantity FROM project_inventory WHERE tenant_id = $1",
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await?;
        let materialized: HashMap<(ProjectId, ItemId), i64> = rows
            .iter()
            .map(|row| {
                Ok((
                    (
                        ProjectId::from_uuid(row.try_get("project_id")?),
                        ItemId::from_uuid(row.try_get("item_id")?),
                    ),
                    row.try_get::<i64, _>("quantity")?,
                ))
            })
            .collect::<Result<_, sqlx::Error>>()?;

        Ok(build_report(tenant_id, &entries, &materialized))
    }
}

fn item_from_row(row: &PgRow) -> Result<Item, sqlx::Error> {
    Ok(Item {
        item_id: ItemId::from_uuid(row.try_get("item_id")?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        quantity: row.try_get("quantity")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn project_from_row(row: &PgRow) -> Result<Project, sqlx::Error> {
    let status: String = row.try_get("status")?;
    Ok(Project {
        project_id: ProjectId::from_uuid(row.try_get("project_id")?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
        name: row.try_get("name")?,
        client_id: row
            .try_get::<Option<Uuid>, _>("client_id")?
            .map(UserId::from_uuid),
        status: ProjectStatus::parse(&status).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn entry_from_row(row: &PgRow) -> Result<LedgerEntry, sqlx::Error> {
    let action: String = row.try_get("action")?;
    Ok(LedgerEntry {
        entry_id: EntryId::from_uuid(row.try_get("entry_id")?),
        tenant_id: TenantId::from_uuid(row.try_get("tenant_id")?),
        item_id: ItemId::from_uuid(row.try_get("item_id")?),
        project_id: ProjectId::from_uuid(row.try_get("project_id")?),
        action: EntryAction::parse(&action).map_err(|e| sqlx::Error::Decode(Box::new(e)))?,
        quantity: row.try_get("quantity")?,
        pool_before: row.try_get("pool_before")?,
        pool_after: row.try_get("pool_after")?,
        recorded_at: row.try_get("recorded_at")?,
    })
}

fn view_from_row(row: &PgRow) -> Result<TransactionView, sqlx::Error> {
    let entry = entry_from_row(row)?;

    let item = row
        .try_get::<Option<String>, _>("item_name")?
        .map(|name| ItemSummary {
            item_id: entry.item_id,
            name,
        });

    let project = match row.try_get::<Option<String>, _>("project_name")? {
        Some(name) => {
            let status: Option<String> = row.try_get("project_status")?;
            let status = status
                .as_deref()
                .map(ProjectStatus::parse)
                .transpose()
                .map_err(|e| sqlx::Error::Decode(Box::new(e)))?
                .unwrap_or(ProjectStatus::Planned);
            Some(ProjectSummary {
                project_id: entry.project_id,
                name,
                status,
            })
        }
        None => None,
    };

    Ok(TransactionView {
        entry,
        item,
        project,
    })
}

fn map_unique_name(err: sqlx::Error, name: &str) -> StoreError {
    if let sqlx::Error::Database(db) = &err {
        if db.constraint() == Some("items_tenant_name_key") {
            return DomainError::conflict(format!("an item named '{name}' already exists")).into();
        }
    }
    err.into()
}
