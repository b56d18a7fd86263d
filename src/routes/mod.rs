use axum::{
    handler::HandlerWithoutStateExt,
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde_json::{json, Value};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::handlers;
use crate::state::AppState;

pub mod health;

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route(
            "/health",
            get(health::health_check).fallback(method_not_allowed),
        )
        .route(
            "/items",
            get(handlers::group::list_groups)
                .post(handlers::group::create_group)
                .fallback(method_not_allowed),
        )
        .route(
            "/items/:id",
            get(handlers::group::get_group)
                .put(handlers::group::update_group)
                .delete(handlers::group::delete_group)
                .fallback(method_not_allowed),
        );

    // Anything else is looked up in the static UI directory
    let serve_dir =
        ServeDir::new(&state.config.static_dir).not_found_service(fallback.into_service());

    api_routes
        .fallback_service(serve_dir)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Fallback handler for 404
pub async fn fallback() -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "code": 404, "error": "Not Found" })),
    )
}

/// Known path, unsupported method
pub async fn method_not_allowed() -> (StatusCode, Json<Value>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(json!({ "code": 405, "error": "Method Not Allowed" })),
    )
}
