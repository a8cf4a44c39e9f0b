//! HTTP route registration.

pub mod health;
pub mod sales;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::AppState;

/// Builds the application router.
///
/// The `/api/venta/...` path is the legacy route older POS firmware still
/// calls; it shares handlers with the canonical path.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route(
            "/api/stores/{store_id}/periods/{period_id}/sales",
            post(sales::commit_sale).get(sales::list_sales),
        )
        .route(
            "/api/venta/{store_id}/{period_id}",
            post(sales::commit_sale).get(sales::list_sales),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
