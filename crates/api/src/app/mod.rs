//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store, audit bus, resolver and entity services
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `errors.rs`: error taxonomy and consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::config::ApiConfig;
use crate::middleware;

pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(config: &ApiConfig, services: Arc<services::AppServices>) -> Router {
    let auth_state = middleware::AuthState {
        services: services.clone(),
        tenant_header: config.tenant_header.clone(),
    };

    // Protected routes: authentication runs first, then the tenant context
    // is established around the handler.
    let protected = routes::router().layer(Extension(services)).layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn_with_state(
                auth_state.clone(),
                middleware::auth_middleware,
            ))
            .layer(axum::middleware::from_fn_with_state(
                auth_state,
                middleware::tenant_context_middleware,
            )),
    );

    Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected)
}
