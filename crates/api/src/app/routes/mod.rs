use axum::{routing::get, Router};

pub mod areas;
pub mod audit;
pub mod findings;
pub mod projects;
pub mod rbac;
pub mod system;
pub mod users;

/// Router for all authenticated (tenant-scoped) endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/projects", projects::router())
        .nest("/findings", findings::router())
        .nest("/areas", areas::router())
        .nest("/users", users::router())
        .nest("/admin/rbac", rbac::router())
        .nest("/admin/audit", audit::router())
}
