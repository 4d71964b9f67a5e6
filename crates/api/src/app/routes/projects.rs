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
use toolroom_catalog::Project;
use toolroom_core::{ProjectId, UserId};

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_project).get(list_projects))
        .route("/:id", get(get_project))
        .route("/:id/inventory", get(project_inventory))
}

pub async fn create_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
    Json(body): Json<dto::CreateProjectRequest>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&tenant, &principal, Permission::new("projects.create")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    let client_id = match body.client_id.as_deref() {
        Some(raw) => match raw.parse::<UserId>() {
            Ok(id) => Some(id),
            Err(_) => {
                return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid client id")
            }
        },
        None => None,
    };

    let project = match Project::new(
        tenant.tenant_id(),
        ProjectId::new(),
        &body.name,
        client_id,
        Utc::now(),
    ) {
        Ok(project) => project,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.store().create_project(project).await {
        Ok(project) => (
            StatusCode::CREATED,
            Json(serde_json::json!({
                "message": "project created",
                "project": dto::project_to_json(&project),
            })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn list_projects(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
) -> axum::response::Response {
    match services.store().list_projects(tenant.tenant_id()).await {
        Ok(projects) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "ok",
                "projects": projects.iter().map(dto::project_to_json).collect::<Vec<_>>(),
            })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_project(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let project_id: ProjectId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid project id")
        }
    };

    match services.store().get_project(tenant.tenant_id(), project_id).await {
        Ok(Some(project)) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "ok",
                "project": dto::project_to_json(&project),
            })),
        )
            .into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "project not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn project_inventory(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let project_id: ProjectId = match id.parse() {
        Ok(v) => v,
        Err(_) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "invalid_id", "invalid project id")
        }
    };

    match services
        .store()
        .project_allocations(tenant.tenant_id(), project_id)
        .await
    {
        Ok(allocations) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "message": "ok",
                "project_id": project_id.to_string(),
                "allocations": allocations.iter().map(dto::allocation_to_json).collect::<Vec<_>>(),
            })),
        )
            .into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
