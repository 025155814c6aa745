//! Issue routes — board listing, CRUD, assignment, search, and moves.
//!
//! Handlers translate HTTP into service calls scoped to the caller's project.
//! Errors map to status codes through `issue_error_to_status`; an issue that
//! belongs to another project is indistinguishable from a missing one.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::IssueStatus;
use crate::position::{DragMove, DropLocation};
use crate::routes::auth::AuthUser;
use crate::services::filter::{self, FilterQuery, IssueFilters};
use crate::services::issue::{self, IssueDetail, IssueError, IssuePatch, IssueRow, MoveOutcome, NewIssue};
use crate::services::project::{self, Project};
use crate::state::AppState;

pub(crate) fn issue_error_to_status(err: &IssueError) -> StatusCode {
    match err {
        IssueError::NotFound(_) | IssueError::Position(_) => StatusCode::NOT_FOUND,
        IssueError::Validation(_) => StatusCode::BAD_REQUEST,
        IssueError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn log_and_map(err: IssueError) -> StatusCode {
    if matches!(err, IssueError::Database(_)) {
        tracing::error!(error = %err, "issue request failed");
    }
    issue_error_to_status(&err)
}

// =============================================================================
// BOARD
// =============================================================================

/// One board column with its header count.
#[derive(Debug, Serialize)]
pub struct BoardColumn {
    pub status: IssueStatus,
    pub label: &'static str,
    /// `"shown of all"` while filters hide issues.
    pub count: String,
    pub issues: Vec<IssueRow>,
}

#[derive(Debug, Serialize)]
pub struct BoardResponse {
    pub project: Project,
    pub filters_cleared: bool,
    pub columns: Vec<BoardColumn>,
}

/// Split filtered issues into columns, counting against the unfiltered set.
pub(crate) fn build_columns(all: &[IssueRow], shown: Vec<IssueRow>) -> Vec<BoardColumn> {
    let mut columns: Vec<BoardColumn> = IssueStatus::ALL
        .iter()
        .map(|&status| BoardColumn { status, label: status.label(), count: String::new(), issues: Vec::new() })
        .collect();
    for row in shown {
        if let Some(column) = columns.iter_mut().find(|c| c.status == row.status) {
            column.issues.push(row);
        }
    }
    for column in &mut columns {
        let total = all.iter().filter(|i| i.status == column.status).count();
        column.count = filter::format_count(total, column.issues.len());
    }
    columns
}

/// `GET /api/board` — project plus filtered issues grouped by column.
pub async fn get_board(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<FilterQuery>,
) -> Result<Json<BoardResponse>, StatusCode> {
    let project_id = auth.project_id()?;
    let project = project::get_project(&state.pool, project_id)
        .await
        .map_err(crate::routes::auth::project_error_to_status)?;

    let filters = IssueFilters::from(query);
    let all = issue::list_issues(&state.pool, project_id, &IssueFilters::default(), Some(auth.user.id))
        .await
        .map_err(log_and_map)?;
    let now = crate::frame::now_ms();
    let shown: Vec<IssueRow> = all
        .iter()
        .filter(|row| filters.matches(row, Some(auth.user.id), now))
        .cloned()
        .collect();

    Ok(Json(BoardResponse { project, filters_cleared: filters.is_cleared(), columns: build_columns(&all, shown) }))
}

// =============================================================================
// LISTING + SEARCH
// =============================================================================

/// `GET /api/issues` — filtered issues in board order.
pub async fn list_issues(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<FilterQuery>,
) -> Result<Json<Vec<IssueRow>>, StatusCode> {
    let project_id = auth.project_id()?;
    let filters = IssueFilters::from(query);
    let issues = issue::list_issues(&state.pool, project_id, &filters, Some(auth.user.id))
        .await
        .map_err(log_and_map)?;
    Ok(Json(issues))
}

#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    term: String,
}

/// `GET /api/issues/search?term=`
pub async fn search_issues(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<IssueRow>>, StatusCode> {
    let project_id = auth.project_id()?;
    let issues = issue::search_issues(&state.pool, project_id, &query.term)
        .await
        .map_err(log_and_map)?;
    Ok(Json(issues))
}

#[derive(Deserialize)]
pub struct RecentQuery {
    limit: Option<i64>,
}

/// `GET /api/issues/recent?limit=`
pub async fn recent_issues(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<IssueRow>>, StatusCode> {
    let project_id = auth.project_id()?;
    let limit = query.limit.unwrap_or(issue::RECENT_LIMIT).clamp(1, 100);
    let issues = issue::recent_issues(&state.pool, project_id, limit)
        .await
        .map_err(log_and_map)?;
    Ok(Json(issues))
}

// =============================================================================
// CRUD
// =============================================================================

/// `POST /api/issues`
pub async fn create_issue(
    State(state): State<AppState>,
    auth: AuthUser,
    Json(body): Json<NewIssue>,
) -> Result<(StatusCode, Json<IssueRow>), StatusCode> {
    let project_id = auth.project_id()?;
    let row = issue::create_issue(&state, project_id, auth.user.id, body)
        .await
        .map_err(log_and_map)?;
    Ok((StatusCode::CREATED, Json(row)))
}

/// `GET /api/issues/{id}` — issue with people and comments.
pub async fn get_issue(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(issue_id): Path<i64>,
) -> Result<Json<IssueDetail>, StatusCode> {
    let project_id = auth.project_id()?;
    let detail = issue::get_issue_detail(&state.pool, project_id, issue_id)
        .await
        .map_err(log_and_map)?;
    Ok(Json(detail))
}

/// `PATCH /api/issues/{id}`
pub async fn update_issue(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(issue_id): Path<i64>,
    Json(patch): Json<IssuePatch>,
) -> Result<Json<IssueRow>, StatusCode> {
    let project_id = auth.project_id()?;
    let row = issue::update_issue(&state, project_id, auth.user.id, issue_id, patch)
        .await
        .map_err(log_and_map)?;
    Ok(Json(row))
}

/// `DELETE /api/issues/{id}`
pub async fn delete_issue(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(issue_id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let project_id = auth.project_id()?;
    issue::delete_issue(&state, project_id, auth.user.id, issue_id)
        .await
        .map_err(log_and_map)?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// ASSIGNEES
// =============================================================================

#[derive(Deserialize)]
pub struct AssigneeBody {
    user_id: Uuid,
}

/// `POST /api/issues/{id}/assignees`
pub async fn add_assignee(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(issue_id): Path<i64>,
    Json(body): Json<AssigneeBody>,
) -> Result<Json<IssueRow>, StatusCode> {
    let project_id = auth.project_id()?;
    let row = issue::add_assignee(&state, project_id, auth.user.id, issue_id, body.user_id)
        .await
        .map_err(log_and_map)?;
    Ok(Json(row))
}

/// `DELETE /api/issues/{id}/assignees/{user_id}`
pub async fn remove_assignee(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((issue_id, user_id)): Path<(i64, Uuid)>,
) -> Result<Json<IssueRow>, StatusCode> {
    let project_id = auth.project_id()?;
    let row = issue::remove_assignee(&state, project_id, auth.user.id, issue_id, user_id)
        .await
        .map_err(log_and_map)?;
    Ok(Json(row))
}

// =============================================================================
// MOVE
// =============================================================================

/// Drag-end payload. A drop outside any column has no destination.
#[derive(Debug, Deserialize)]
pub struct MoveBody {
    pub source: DropLocation,
    pub destination: Option<DropLocation>,
}

/// `POST /api/issues/{id}/move`
pub async fn move_issue(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(issue_id): Path<i64>,
    Json(body): Json<MoveBody>,
) -> Result<Json<MoveOutcome>, StatusCode> {
    let project_id = auth.project_id()?;
    let drag = DragMove { issue_id, source: body.source, destination: body.destination.unwrap_or(body.source) };
    let outcome = issue::move_issue(&state, project_id, auth.user.id, drag)
        .await
        .map_err(log_and_map)?;
    Ok(Json(outcome))
}

#[cfg(test)]
#[path = "issues_test.rs"]
mod tests;
