use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;

use toolroom_auth::Permission;
use toolroom_catalog::Item;
use toolroom_core::ItemId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/items", post(create_item).get(list_items))
        .route("/items/:id", get(get_item).put(update_item).delete(delete_item))
}

pub async fn create_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::CreateItemRequest>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&tenant, &principal, Permission::new("catalog.items.create"))
    {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let item = match Item::new(
        tenant.tenant_id(),
        ItemId::new(),
        &body.name,
        body.description,
        body.quantity.unwrap_or(0),
        Utc::now(),
    ) {
        Ok(item) => item,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.store().create_item(item).await {
        Ok(item) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "message": "item created",
                "item": dto::item_to_json(&item),
            })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_items(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    match services.store().list_items(tenant.tenant_id()).await {
        Ok(items) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "ok",
                "items": items.iter().map(dto::item_to_json).collect::<Vec<_>>(),
            })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let item_id: ItemId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id"),
    };

    match services.store().get_item(tenant.tenant_id(), item_id).await {
        Ok(Some(item)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "ok",
                "item": dto::item_to_json(&item),
            })),
        )
            .into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "item not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn update_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::UpdateItemRequest>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&tenant, &principal, Permission::new("catalog.items.update"))
    {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let item_id: ItemId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id"),
    };

    match services
        .store()
        .update_item(tenant.tenant_id(), item_id, body.into(), Utc::now())
        .await
    {
        Ok(item) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "item updated",
                "item": dto::item_to_json(&item),
            })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&tenant, &principal, Permission::new("catalog.items.delete"))
    {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let item_id: ItemId = match id.parse() {
        Ok(v) => v,
        Err(_) => return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid item id"),
    };

    match services.store().delete_item(tenant.tenant_id(), item_id).await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({ "message": "item deleted" })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
