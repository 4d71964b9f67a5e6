use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use toolroom_auth::Permission;
use toolroom_core::EntryId;
use toolroom_ledger::EntryAction;
use toolroom_store::{EntryFilter, Pagination};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_transactions))
        .route("/borrow", post(borrow))
        .route("/return", post(return_item))
        .route("/:id", get(get_transaction))
}

pub async fn borrow(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::MovementRequest>,
) -> axum::response::Response {
    let (item_id, project_id, quantity) = match dto::parse_movement(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    if let Err(e) = crate::authz::require(&tenant, &principal, Permission::new("ledger.borrow")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    match services
        .store()
        .borrow_item(tenant.tenant_id(), item_id, project_id, quantity, Utc::now())
        .await
    {
        Ok(outcome) => {
            services.notify_movement(tenant.tenant_id(), &outcome);
            (
                StatusCode::CREATED,
                Json(serde_json::json!({
                    "message": "borrow recorded",
                    "transaction": dto::entry_to_json(&outcome.entry),
                    "item": dto::item_to_json(&outcome.item),
                })),
            )
                .into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn return_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::MovementRequest>,
) -> axum::response::Response {
    let (item_id, project_id, quantity) = match dto::parse_movement(body) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    if let Err(e) = crate::authz::require(&tenant, &principal, Permission::new("ledger.return")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    match services
        .store()
        .return_item(tenant.tenant_id(), item_id, project_id, quantity, Utc::now())
        .await
    {
        Ok(outcome) => {
            services.notify_movement(tenant.tenant_id(), &outcome);
            (
                StatusCode::CREATED,
                Json(serde_json::json!({
                    "message": "return recorded",
                    "transaction": dto::entry_to_json(&outcome.entry),
                    "item": dto::item_to_json(&outcome.item),
                })),
            )
                .into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Query(query): Query<dto::ListTransactionsQuery>,
) -> axum::response::Response {
    let mut filter = EntryFilter::default();
    if let Some(raw) = query.item_id.as_deref() {
        match raw.parse() {
            Ok(id) => filter.item_id = Some(id),
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id")
            }
        }
    }
    if let Some(raw) = query.project_id.as_deref() {
        match raw.parse() {
            Ok(id) => filter.project_id = Some(id),
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid project id")
            }
        }
    }
    if let Some(raw) = query.action.as_deref() {
        match EntryAction::parse(raw) {
            Ok(action) => filter.action = Some(action),
            Err(e) => return errors::domain_error_to_response(e),
        }
    }

    let pagination = Pagination::new(query.limit, query.offset);

    match services
        .store()
        .list_entries(tenant.tenant_id(), filter, pagination)
        .await
    {
        Ok(page) => {
            if page.entries.is_empty() {
                return errors::json_error(
                    StatusCode::NOT_FOUND,
                    "not_found",
                    "no transactions found",
                );
            }
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "message": "ok",
                    "transactions": page.entries.iter().map(dto::transaction_to_json).collect::<Vec<_>>(),
                    "total": page.total,
                    "limit": page.pagination.limit,
                    "offset": page.pagination.offset,
                    "has_more": page.has_more,
                })),
            )
                .into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_transaction(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let entry_id: EntryId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid transaction id")
        }
    };

    match services.store().get_entry(tenant.tenant_id(), entry_id).await {
        Ok(Some(view)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "ok",
                "transaction": dto::transaction_to_json(&view),
            })),
        )
            .into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "transaction not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}
