use axum::extract::{Path, Query, State};
use axum::Json;
use common::error::AppError;
use ledger::{RunList, RunRow, RunType};
use serde::Deserialize;

use crate::api_state::ApiState;
use crate::error::ApiError;

fn default_limit() -> usize {
    100
}

#[derive(Deserialize)]
pub struct ListRunsQuery {
    pub workspace_id: Option<String>,
    pub run_type: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn parse_run_type(raw: Option<&str>) -> RunType {
    match raw {
        Some("index") => RunType::Index,
        Some("query") => RunType::Query,
        _ => RunType::All,
    }
}

pub async fn list_runs(
    State(state): State<ApiState>,
    Query(params): Query<ListRunsQuery>,
) -> Result<Json<RunList>, ApiError> {
    let run_type = parse_run_type(params.run_type.as_deref());
    let runs = state
        .ledger
        .list_runs(params.workspace_id.as_deref(), run_type, params.limit)
        .await?;
    Ok(Json(runs))
}

pub async fn get_run(
    State(state): State<ApiState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunRow>, ApiError> {
    let run = state.ledger.get_run(&run_id).await?;
    run.map(Json).ok_or_else(|| AppError::NotFound(run_id).into())
}
