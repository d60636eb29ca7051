//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! Binds the generic resource endpoints under `/api/{resource}` plus a
//! health check. Static segments (`counts`, `reorder`) take priority over the
//! `{id}` capture, so those two names are not addressable as record ids.
//! Unsupported verbs on a resource path answer 404 when the resource is
//! unknown and 405 otherwise.

pub mod resources;

use axum::Router;
use axum::http::{Method, StatusCode};
use axum::routing::{get, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/{resource}",
            get(resources::list)
                .post(resources::create)
                .fallback(resources::unsupported_method),
        )
        .route(
            "/api/{resource}/counts",
            get(resources::counts).fallback(resources::unsupported_method),
        )
        .route(
            "/api/{resource}/reorder",
            put(resources::reorder).fallback(resources::unsupported_method),
        )
        .route(
            "/api/{resource}/{id}",
            get(resources::get_one)
                .put(resources::update)
                .delete(resources::delete)
                .fallback(resources::unsupported_method),
        )
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
