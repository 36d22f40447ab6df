use axum::extract::State;
use axum::Json;
use common::error::AppError;
use common::models::{QueryRequest, QueryResponse};

use crate::api_state::ApiState;
use crate::error::ApiError;

pub async fn query(
    State(state): State<ApiState>,
    Json(request): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    request.validate().map_err(AppError::BadRequest)?;

    let pipeline = state.pipeline_for(&request.workspace_id).await;
    let response = pipeline.query(&request).await?;

    let excerpt_hashes: Vec<String> = response.citations.iter().map(|c| c.content_hash.clone()).collect();
    state.ledger.record_query_run(&response, &excerpt_hashes).await?;
    state.record_query();

    Ok(Json(response))
}
