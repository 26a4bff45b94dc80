//! Health check endpoint

use axum::Json;
use serde_json::{Value, json};

/// GET /health
///
/// Always 200; never triggers a scrape.
pub async fn health_check() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
