use axum::extract::State;
use axum::Json;
use common::models::{IndexRequest, IndexResult};

use crate::api_state::ApiState;
use crate::error::ApiError;

pub async fn index(
    State(state): State<ApiState>,
    Json(request): Json<IndexRequest>,
) -> Result<Json<IndexResult>, ApiError> {
    let pipeline = state.pipeline_for(&request.workspace_id).await;
    let result = pipeline
        .index_documents(&request, state.config.chunk_size, state.config.chunk_overlap)
        .await?;

    state.ledger.record_index_run(&result, state.config.embed_provider.as_str()).await?;

    Ok(Json(result))
}
