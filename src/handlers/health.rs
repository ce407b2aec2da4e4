use axum::{extract::State, response::Json};
use serde_json::json;

use crate::handlers::AppState;

pub async fn liveness() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn readiness(State(state): State<AppState>) -> Json<serde_json::Value> {
    let db_status = match state.database.ping().await {
        Ok(_) => "healthy",
        Err(e) => {
            tracing::warn!("Database ping failed: {}", e);
            "unhealthy"
        }
    };

    let overall_status = if db_status == "healthy" { "ready" } else { "not_ready" };

    Json(json!({
        "status": overall_status,
        "checks": {
            "database": db_status
        },
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
