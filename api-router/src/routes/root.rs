use axum::extract::State;
use axum::Json;
use common::models::ServiceBanner;
use serde_json::json;

use crate::api_state::ApiState;

pub async fn banner(State(_state): State<ApiState>) -> Json<ServiceBanner> {
    Json(ServiceBanner {
        service: "NEXUS RAG API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        endpoints: json!({
            "health": "/health",
            "query": "POST /query",
            "index": "POST /index",
            "workspaces": "GET /workspaces",
            "create_workspace": "POST /workspaces?workspace_id=<id>",
            "runs": "GET /runs",
            "run_details": "GET /runs/{run_id}",
        }),
    })
}
