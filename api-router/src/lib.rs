use api_state::ApiState;
use axum::extract::FromRef;
use axum::routing::{get, post};
use axum::Router;
use routes::{
    health::health,
    index::index,
    query::query,
    root::banner,
    runs::{get_run, list_runs},
    workspaces::{create_workspace, list_workspaces},
};

pub mod api_state;
pub mod error;
mod routes;

/// Router for the full NEXUS HTTP surface, mounted at bare paths (no
/// `/api/v1` nesting).
pub fn nexus_routes<S>(_app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        .route("/query", post(query))
        .route("/index", post(index))
        .route("/workspaces", get(list_workspaces).post(create_workspace))
        .route("/runs", get(list_runs))
        .route("/runs/{run_id}", get(get_run))
}
