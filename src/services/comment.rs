//! Comment service — discussion threads on issues.
//!
//! Comments belong to an issue and inherit its project scope: every lookup
//! joins through `issues` so a comment id from another project reads as
//! missing.

use serde::Serialize;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::frame::{Data, ErrorCode};
use crate::model::UserSummary;
use crate::services::feed;
use crate::state::AppState;

#[derive(Debug, thiserror::Error)]
pub enum CommentError {
    #[error("comment not found: {0}")]
    NotFound(i64),
    #[error("issue not found: {0}")]
    IssueNotFound(i64),
    #[error("comment body is required")]
    EmptyBody,
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for CommentError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_COMMENT_NOT_FOUND",
            Self::IssueNotFound(_) => "E_ISSUE_NOT_FOUND",
            Self::EmptyBody => "E_VALIDATION",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentRow {
    pub id: i64,
    pub issue_id: i64,
    pub body: String,
    pub user: UserSummary,
    pub created_at: i64,
    pub updated_at: i64,
}

const COMMENT_SELECT: &str = r"
    SELECT c.id, c.issue_id, c.body, c.user_id, u.name AS user_name, u.avatar_url AS user_avatar_url,
           (EXTRACT(EPOCH FROM c.created_at) * 1000)::BIGINT AS created_at,
           (EXTRACT(EPOCH FROM c.updated_at) * 1000)::BIGINT AS updated_at
    FROM comments c
    JOIN users u ON u.id = c.user_id
    JOIN issues i ON i.id = c.issue_id";

fn comment_from_row(row: &PgRow) -> CommentRow {
    CommentRow {
        id: row.get("id"),
        issue_id: row.get("issue_id"),
        body: row.get("body"),
        user: UserSummary {
            id: row.get("user_id"),
            name: row.get("user_name"),
            avatar_url: row.get("user_avatar_url"),
        },
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// A body counts as present when it has any non-whitespace content. The body
/// itself is stored as typed.
///
/// # Errors
///
/// Returns `EmptyBody` for blank input.
pub fn validate_body(body: &str) -> Result<(), CommentError> {
    if body.trim().is_empty() {
        return Err(CommentError::EmptyBody);
    }
    Ok(())
}

/// Comments on an issue, newest first.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_comments(pool: &PgPool, project_id: i64, issue_id: i64) -> Result<Vec<CommentRow>, CommentError> {
    let sql = format!("{COMMENT_SELECT} WHERE c.issue_id = $1 AND i.project_id = $2 ORDER BY c.created_at DESC, c.id DESC");
    let rows = sqlx::query(&sql)
        .bind(issue_id)
        .bind(project_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(comment_from_row).collect())
}

async fn fetch_comment(pool: &PgPool, project_id: i64, comment_id: i64) -> Result<CommentRow, CommentError> {
    let sql = format!("{COMMENT_SELECT} WHERE c.id = $1 AND i.project_id = $2");
    let row = sqlx::query(&sql)
        .bind(comment_id)
        .bind(project_id)
        .fetch_optional(pool)
        .await?
        .ok_or(CommentError::NotFound(comment_id))?;
    Ok(comment_from_row(&row))
}

fn comment_data(comment: &CommentRow) -> Data {
    let mut data = Data::new();
    data.insert("issue_id".into(), comment.issue_id.into());
    data.insert("comment".into(), serde_json::to_value(comment).unwrap_or_default());
    data
}

/// # Errors
///
/// Returns `EmptyBody` for blank input and `IssueNotFound` when the issue is
/// not in the caller's project.
pub async fn create_comment(
    state: &AppState,
    project_id: i64,
    actor: Uuid,
    issue_id: i64,
    body: &str,
) -> Result<CommentRow, CommentError> {
    validate_body(body)?;

    let row = sqlx::query(
        r"INSERT INTO comments (issue_id, user_id, body)
          SELECT id, $3, $4 FROM issues WHERE id = $1 AND project_id = $2
          RETURNING id",
    )
    .bind(issue_id)
    .bind(project_id)
    .bind(actor)
    .bind(body)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(CommentError::IssueNotFound(issue_id))?;

    let comment = fetch_comment(&state.pool, project_id, row.get("id")).await?;
    info!(%project_id, issue_id, comment_id = comment.id, "comment created");
    feed::publish(state, project_id, "comment:create", Some(actor), comment_data(&comment)).await;
    Ok(comment)
}

/// # Errors
///
/// Returns `EmptyBody` for blank input and `NotFound` for unknown comments.
pub async fn update_comment(
    state: &AppState,
    project_id: i64,
    actor: Uuid,
    comment_id: i64,
    body: &str,
) -> Result<CommentRow, CommentError> {
    validate_body(body)?;

    let result = sqlx::query(
        r"UPDATE comments c SET body = $3, updated_at = now()
          FROM issues i
          WHERE c.id = $1 AND i.id = c.issue_id AND i.project_id = $2",
    )
    .bind(comment_id)
    .bind(project_id)
    .bind(body)
    .execute(&state.pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(CommentError::NotFound(comment_id));
    }

    let comment = fetch_comment(&state.pool, project_id, comment_id).await?;
    feed::publish(state, project_id, "comment:update", Some(actor), comment_data(&comment)).await;
    Ok(comment)
}

/// # Errors
///
/// Returns `NotFound` for unknown comments.
pub async fn delete_comment(state: &AppState, project_id: i64, actor: Uuid, comment_id: i64) -> Result<(), CommentError> {
    let row = sqlx::query(
        r"DELETE FROM comments c
          USING issues i
          WHERE c.id = $1 AND i.id = c.issue_id AND i.project_id = $2
          RETURNING c.issue_id",
    )
    .bind(comment_id)
    .bind(project_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or(CommentError::NotFound(comment_id))?;

    let issue_id: i64 = row.get("issue_id");
    info!(%project_id, issue_id, comment_id, "comment deleted");

    let mut data = Data::new();
    data.insert("issue_id".into(), issue_id.into());
    data.insert("comment_id".into(), comment_id.into());
    feed::publish(state, project_id, "comment:delete", Some(actor), data).await;
    Ok(())
}

#[cfg(test)]
#[path = "comment_test.rs"]
mod tests;
