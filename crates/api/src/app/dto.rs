use axum::http::StatusCode;
use serde::Deserialize;

use toolroom_catalog::{Item, ItemEdit, Project};
use toolroom_core::{ItemId, ProjectId};
use toolroom_store::{AllocationView, ReconcileReport, TransactionView};

use crate::app::errors;

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct CreateItemRequest {
    pub name: String,
    pub description: Option<String>,
    pub quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub quantity: Option<i64>,
}

impl From<UpdateItemRequest> for ItemEdit {
    fn from(req: UpdateItemRequest) -> Self {
        ItemEdit {
            name: req.name,
            description: req.description,
            quantity: req.quantity,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub name: String,
    pub client_id: Option<String>,
}

/// Borrow/return request body. Every field is optional at the serde level so
/// that presence can be validated by hand into 400s rather than the
/// extractor's 422s.
#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    pub item_id: Option<String>,
    pub project_id: Option<String>,
    pub quantity: Option<i64>,
}

/// Validate presence and positivity before the ledger is ever consulted.
pub fn parse_movement(
    body: MovementRequest,
) -> Result<(ItemId, ProjectId, i64), axum::response::Response> {
    let item_id = body
        .item_id
        .ok_or_else(|| missing_field("item_id"))?
        .parse::<ItemId>()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))?;

    let project_id = body
        .project_id
        .ok_or_else(|| missing_field("project_id"))?
        .parse::<ProjectId>()
        .map_err(|e| errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", e.to_string()))?;

    let quantity = body.quantity.ok_or_else(|| missing_field("quantity"))?;
    if quantity <= 0 {
        return Err(errors::json_error(
            StatusCode::BAD_REQUEST,
            "validation_error",
            "quantity must be positive",
        ));
    }

    Ok((item_id, project_id, quantity))
}

fn missing_field(field: &str) -> axum::response::Response {
    errors::json_error(
        StatusCode::BAD_REQUEST,
        "validation_error",
        format!("{field} is required"),
    )
}

#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    pub limit: Option<u32>,
    pub offset: Option<u32>,
    pub item_id: Option<String>,
    pub project_id: Option<String>,
    pub action: Option<String>,
}

// -------------------------
// JSON mapping helpers
// -------------------------

pub fn item_to_json(item: &Item) -> serde_json::Value {
    serde_json::json!({
        "item_id": item.item_id.to_string(),
        "name": item.name,
        "description": item.description,
        "quantity": item.quantity,
        "created_at": item.created_at.to_rfc3339(),
        "updated_at": item.updated_at.to_rfc3339(),
    })
}

pub fn project_to_json(project: &Project) -> serde_json::Value {
    serde_json::json!({
        "project_id": project.project_id.to_string(),
        "name": project.name,
        "client_id": project.client_id.map(|c| c.to_string()),
        "status": project.status.as_str(),
        "created_at": project.created_at.to_rfc3339(),
        "updated_at": project.updated_at.to_rfc3339(),
    })
}

pub fn transaction_to_json(view: &TransactionView) -> serde_json::Value {
    serde_json::json!({
        "transaction_id": view.entry.entry_id.to_string(),
        "action": view.entry.action.as_str(),
        "quantity": view.entry.quantity,
        "pool_before": view.entry.pool_before,
        "pool_after": view.entry.pool_after,
        "date": view.entry.recorded_at.to_rfc3339(),
        "item": view.item.as_ref().map(|i| serde_json::json!({
            "item_id": i.item_id.to_string(),
            "name": i.name,
        })),
        "project": view.project.as_ref().map(|p| serde_json::json!({
            "project_id": p.project_id.to_string(),
            "name": p.name,
            "status": p.status.as_str(),
        })),
    })
}

pub fn entry_to_json(entry: &toolroom_ledger::LedgerEntry) -> serde_json::Value {
    serde_json::json!({
        "transaction_id": entry.entry_id.to_string(),
        "item_id": entry.item_id.to_string(),
        "project_id": entry.project_id.to_string(),
        "action": entry.action.as_str(),
        "quantity": entry.quantity,
        "pool_before": entry.pool_before,
        "pool_after": entry.pool_after,
        "date": entry.recorded_at.to_rfc3339(),
    })
}

pub fn allocation_to_json(view: &AllocationView) -> serde_json::Value {
    serde_json::json!({
        "item_id": view.item_id.to_string(),
        "item_name": view.item_name,
        "quantity": view.quantity,
    })
}

pub fn reconcile_report_to_json(report: &ReconcileReport) -> serde_json::Value {
    serde_json::json!({
        "tenant_id": report.tenant_id.to_string(),
        "entries_replayed": report.entries_replayed,
        "clean": report.is_clean(),
        "allocation_drift": report.allocation_drift.iter().map(|d| serde_json::json!({
            "project_id": d.project_id.to_string(),
            "item_id": d.item_id.to_string(),
            "expected": d.expected,
            "actual": d.actual,
        })).collect::<Vec<_>>(),
        "log_breaks": report.log_breaks.iter().map(|b| serde_json::json!({
            "kind": b.kind,
            "item_id": b.item_id.to_string(),
            "entry_id": b.entry_id.to_string(),
            "detail": b.detail,
        })).collect::<Vec<_>>(),
    })
}
