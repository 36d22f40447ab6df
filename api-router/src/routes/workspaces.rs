use axum::extract::{Query, State};
use axum::Json;
use common::error::AppError;
use common::models::{WorkspaceCreated, WorkspaceInfo};
use serde::{Deserialize, Serialize};

use crate::api_state::ApiState;
use crate::error::ApiError;

#[derive(Serialize)]
pub struct WorkspaceList {
    pub workspaces: Vec<WorkspaceInfo>,
    pub total: usize,
}

pub async fn list_workspaces(State(state): State<ApiState>) -> Result<Json<WorkspaceList>, ApiError> {
    let mut workspaces = Vec::new();
    for workspace_id in state.vector_stores.list_partition_ids() {
        let stats = state.ledger.get_workspace_stats(&workspace_id).await?;
        workspaces.push(WorkspaceInfo {
            workspace_id,
            stats: serde_json::to_value(stats).unwrap_or(serde_json::Value::Null),
        });
    }

    Ok(Json(WorkspaceList {
        total: workspaces.len(),
        workspaces,
    }))
}

#[derive(Deserialize)]
pub struct CreateWorkspaceQuery {
    pub workspace_id: Option<String>,
}

pub async fn create_workspace(
    State(state): State<ApiState>,
    Query(params): Query<CreateWorkspaceQuery>,
) -> Result<Json<WorkspaceCreated>, ApiError> {
    let workspace_id = params
        .workspace_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| AppError::BadRequest("workspace_id is required".to_string()))?;

    let vector_store = state.vector_stores.get_or_create(&workspace_id).await;
    vector_store.create_partition_dir()?;
    let chroma_path = vector_store.partition_path().to_string_lossy().to_string();

    Ok(Json(WorkspaceCreated {
        workspace_id,
        status: "created".to_string(),
        chroma_path,
    }))
}
