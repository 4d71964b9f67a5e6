//! Admin endpoints: ledger replay/reconciliation.

use std::sync::Arc;

use axum::{
    extract::Extension, http::StatusCode, response::IntoResponse, routing::post, Json, Router,
};

use toolroom_auth::Permission;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new().route("/reconcile", post(reconcile))
}

/// Replay the tenant's ledger and report drift against the materialized
/// allocation rows. Reporting only; nothing is repaired.
pub async fn reconcile(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<crate::context::TenantContext>,
    Extension(principal): Extension<crate::context::PrincipalContext>,
) -> axum::response::Response {
    if let Err(e) = crate::authz::require(&tenant, &principal, Permission::new("admin.reconcile")) {
        return errors::json_error(StatusCode::FORBIDDEN, "forbidden", e.to_string());
    }

    match services.store().reconcile(tenant.tenant_id()).await {
        Ok(report) => {
            if !report.is_clean() {
                tracing::warn!(
                    tenant_id = %report.tenant_id,
                    drift = report.allocation_drift.len(),
                    log_breaks = report.log_breaks.len(),
                    "ledger reconciliation found drift"
                );
            }
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "message": if report.is_clean() { "ledger is consistent" } else { "drift detected" },
                    "report": dto::reconcile_report_to_json(&report),
                })),
            )
                .into_response()
        }
        Err(e) => errors::store_error_to_response(e),
    }
}
