use std::sync::atomic::Ordering;

use axum::extract::State;
use axum::Json;
use common::models::{HealthStatus, PerformanceMetrics};

use crate::api_state::ApiState;

const DEFAULT_WORKSPACE: &str = "default";

pub async fn health(State(state): State<ApiState>) -> Json<HealthStatus> {
    let vector_store = state.vector_stores.get_or_create(DEFAULT_WORKSPACE).await;
    let materialized = vector_store.is_open().await;
    let documents_indexed = if materialized {
        vector_store.chunk_count().await.unwrap_or(0)
    } else {
        0
    };

    Json(HealthStatus {
        status: "healthy".to_string(),
        mode: state.config.mode.as_str().to_string(),
        llm_provider: state.config.llm_provider.as_str().to_string(),
        embed_provider: state.config.embed_provider.as_str().to_string(),
        vector_store_ready: materialized,
        documents_indexed,
        uptime_seconds: state.uptime_seconds(),
        metrics: PerformanceMetrics {
            cache_hit_rate: 0.0,
            avg_query_latency_ms: 0.0,
            total_queries: state.query_count.load(Ordering::Relaxed),
            memory_mb: 0.0,
        },
    })
}
