//! Health check endpoint.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::AppState;

/// GET /health
///
/// Reports process liveness and database reachability.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = state.engine.database().health_check().await;

    Json(json!({
        "status": if database { "ok" } else { "degraded" },
        "database": database,
    }))
}
