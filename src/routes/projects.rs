//! Project routes — settings page and member list.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;

use crate::model::UserSummary;
use crate::routes::auth::{AuthUser, project_error_to_status};
use crate::services::project::{self, Project, ProjectPatch};
use crate::state::AppState;

/// `GET /api/project` — the caller's project with its users.
pub async fn get_project(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Project>, StatusCode> {
    let project_id = auth.project_id()?;
    let project = project::get_project(&state.pool, project_id)
        .await
        .map_err(project_error_to_status)?;
    Ok(Json(project))
}

/// `PATCH /api/project` — update name, url, description, or category.
pub async fn update_project(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(patch): Json<ProjectPatch>,
) -> Result<Json<Project>, StatusCode> {
    let project_id = auth.project_id()?;
    let project = project::update_project(&state.pool, project_id, patch)
        .await
        .map_err(project_error_to_status)?;
    Ok(Json(project))
}

/// `GET /api/project/users`
pub async fn list_users(State(state): State<AppState>, auth: AuthUser) -> Result<Json<Vec<UserSummary>>, StatusCode> {
    let project_id = auth.project_id()?;
    let users = project::list_users(&state.pool, project_id)
        .await
        .map_err(project_error_to_status)?;
    Ok(Json(users))
}
