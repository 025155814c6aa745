//! Comment routes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;

use crate::routes::auth::AuthUser;
use crate::services::comment::{self, CommentError, CommentRow};
use crate::state::AppState;

pub(crate) fn comment_error_to_status(err: &CommentError) -> StatusCode {
    match err {
        CommentError::NotFound(_) | CommentError::IssueNotFound(_) => StatusCode::NOT_FOUND,
        CommentError::EmptyBody => StatusCode::BAD_REQUEST,
        CommentError::Database(e) => {
            tracing::error!(error = %e, "comment request failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

#[derive(Deserialize)]
pub struct CommentBody {
    body: String,
}

/// `GET /api/issues/{id}/comments` — newest first.
pub async fn list_comments(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(issue_id): Path<i64>,
) -> Result<Json<Vec<CommentRow>>, StatusCode> {
    let project_id = auth.project_id()?;
    let comments = comment::list_comments(&state.pool, project_id, issue_id)
        .await
        .map_err(|e| comment_error_to_status(&e))?;
    Ok(Json(comments))
}

/// `POST /api/issues/{id}/comments`
pub async fn create_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(issue_id): Path<i64>,
    Json(body): Json<CommentBody>,
) -> Result<(StatusCode, Json<CommentRow>), StatusCode> {
    let project_id = auth.project_id()?;
    let row = comment::create_comment(&state, project_id, auth.user.id, issue_id, &body.body)
        .await
        .map_err(|e| comment_error_to_status(&e))?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `PATCH /api/comments/{id}`
pub async fn update_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(comment_id): Path<i64>,
    Json(body): Json<CommentBody>,
) -> Result<Json<CommentRow>, StatusCode> {
    let project_id = auth.project_id()?;
    let row = comment::update_comment(&state, project_id, auth.user.id, comment_id, &body.body)
        .await
        .map_err(|e| comment_error_to_status(&e))?;
    Ok(Json(row))
}

/// `DELETE /api/comments/{id}`
pub async fn delete_comment(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(comment_id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let project_id = auth.project_id()?;
    comment::delete_comment(&state, project_id, auth.user.id, comment_id)
        .await
        .map_err(|e| comment_error_to_status(&e))?;
    Ok(StatusCode::NO_CONTENT)
}
