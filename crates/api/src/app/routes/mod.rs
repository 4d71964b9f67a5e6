use axum::{routing::get, Router};

pub mod admin;
pub mod items;
pub mod projects;
pub mod system;
pub mod transactions;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/stream", get(system::stream))
        .nest("/catalog", items::router())
        .nest("/projects", projects::router())
        .nest("/transactions", transactions::router())
        .nest("/admin", admin::router())
}
