//! Issue service — CRUD, assignment, search, and drag-and-drop moves.
//!
//! DESIGN
//! ======
//! Postgres is the source of truth. Every write runs against the database
//! first and publishes a feed event only after it commits.
//!
//! Moves lock the project's issue rows (`SELECT ... FOR UPDATE`) before
//! computing the new position, so two concurrent drags into the same column
//! serialize instead of both averaging the same pair of neighbors. The
//! computation itself is `position::plan_move`; this module only loads the
//! column, applies the plan, and decides whether the rebalance sweep should
//! look at the column later.
//!
//! ERROR HANDLING
//! ==============
//! A dragged issue missing from the project surfaces as
//! `IssueError::Position(IssueNotFound)`; nothing is written and the failure
//! is logged. Foreign-key violations (unknown user ids) are reported as
//! validation errors rather than database failures.

use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{Executor, PgPool, Postgres, Row, Transaction};
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::decode_enum;
use crate::frame::{Data, ErrorCode};
use crate::model::{IssuePriority, IssueStatus, IssueType, UserSummary, nullable};
use crate::position::{self, DragMove, DropLocation, MovePlan, PositionError, PositionedIssue};
use crate::services::comment::{self, CommentError, CommentRow};
use crate::services::feed;
use crate::state::AppState;

const MAX_TITLE_LEN: usize = 200;

/// Default page size for the "recent issues" list.
pub const RECENT_LIMIT: i64 = 10;

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum IssueError {
    #[error("issue not found: {0}")]
    NotFound(i64),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Position(#[from] PositionError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for IssueError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_ISSUE_NOT_FOUND",
            Self::Validation(_) => "E_VALIDATION",
            Self::Position(err) => err.error_code(),
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

impl From<CommentError> for IssueError {
    fn from(err: CommentError) -> Self {
        match err {
            CommentError::Database(db) => Self::Database(db),
            CommentError::IssueNotFound(id) => Self::NotFound(id),
            other => Self::Validation(other.to_string()),
        }
    }
}

/// An issue as the board sees it. Timestamps are epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IssueRow {
    pub id: i64,
    pub project_id: i64,
    pub title: String,
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub status: IssueStatus,
    pub priority: IssuePriority,
    pub list_position: f64,
    pub description: Option<String>,
    pub description_text: Option<String>,
    pub estimate: Option<i32>,
    pub time_spent: Option<i32>,
    pub time_remaining: Option<i32>,
    pub reporter_id: Uuid,
    pub assignee_id: Option<Uuid>,
    /// Additional users attached to the issue.
    pub user_ids: Vec<Uuid>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Full issue view: people and discussion included.
#[derive(Debug, Clone, Serialize)]
pub struct IssueDetail {
    pub issue: IssueRow,
    pub reporter: Option<UserSummary>,
    pub assignees: Vec<UserSummary>,
    pub comments: Vec<CommentRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewIssue {
    pub title: String,
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub priority: IssuePriority,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub estimate: Option<i32>,
    /// Defaults to the creating user.
    #[serde(default)]
    pub reporter_id: Option<Uuid>,
    #[serde(default)]
    pub assignee_id: Option<Uuid>,
    #[serde(default)]
    pub user_ids: Vec<Uuid>,
}

/// Partial update. `null` clears nullable fields; absent fields are kept.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssuePatch {
    pub title: Option<String>,
    #[serde(rename = "type")]
    pub issue_type: Option<IssueType>,
    pub status: Option<IssueStatus>,
    pub priority: Option<IssuePriority>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub estimate: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub time_spent: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub time_remaining: Option<Option<i32>>,
    pub reporter_id: Option<Uuid>,
    #[serde(default, deserialize_with = "nullable")]
    pub assignee_id: Option<Option<Uuid>>,
    /// Replaces the additional users wholesale.
    pub user_ids: Option<Vec<Uuid>>,
}

/// Where a moved issue ended up.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoveOutcome {
    pub issue_id: i64,
    pub status: IssueStatus,
    pub list_position: f64,
    /// Other issues whose positions were reassigned by this move.
    pub renormalized: Vec<(i64, f64)>,
}

// =============================================================================
// VALIDATION
// =============================================================================

/// # Errors
///
/// Rejects blank titles and titles over the length limit.
pub fn validate_title(title: &str) -> Result<String, IssueError> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(IssueError::Validation("title is required".into()));
    }
    if trimmed.chars().count() > MAX_TITLE_LEN {
        return Err(IssueError::Validation(format!("title must be at most {MAX_TITLE_LEN} characters")));
    }
    Ok(trimmed.to_owned())
}

fn validate_hours(field: &str, value: Option<i32>) -> Result<(), IssueError> {
    if value.is_some_and(|v| v < 0) {
        return Err(IssueError::Validation(format!("{field} must not be negative")));
    }
    Ok(())
}

/// Plain text of a rich-text description, used for search.
#[must_use]
pub fn strip_html(html: &str) -> String {
    let mut text = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                text.push(' ');
            }
            _ if !in_tag => text.push(c),
            _ => {}
        }
    }
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn description_text(description: Option<&str>) -> Option<String> {
    description.map(strip_html)
}

/// Primary assignee: the explicit one, else the first additional user.
fn effective_assignee(assignee_id: Option<Uuid>, user_ids: &[Uuid]) -> Option<Uuid> {
    assignee_id.or_else(|| user_ids.first().copied())
}

fn unique_users(user_ids: &[Uuid]) -> Vec<Uuid> {
    let mut seen = Vec::with_capacity(user_ids.len());
    for id in user_ids {
        if !seen.contains(id) {
            seen.push(*id);
        }
    }
    seen
}

fn map_write_error(err: sqlx::Error) -> IssueError {
    let is_fk = err
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23503");
    if is_fk {
        return IssueError::Validation("unknown user".into());
    }
    IssueError::Database(err)
}

// =============================================================================
// ROW LOADING
// =============================================================================

const ISSUE_SELECT: &str = r"
    SELECT i.id, i.project_id, i.title, i.type, i.status, i.priority, i.list_position,
           i.description, i.description_text, i.estimate, i.time_spent, i.time_remaining,
           i.reporter_id, i.assignee_id,
           ARRAY(SELECT iu.user_id FROM issue_users iu WHERE iu.issue_id = i.id ORDER BY iu.user_id) AS user_ids,
           (EXTRACT(EPOCH FROM i.created_at) * 1000)::BIGINT AS created_at,
           (EXTRACT(EPOCH FROM i.updated_at) * 1000)::BIGINT AS updated_at
    FROM issues i";

fn issue_from_row(row: &PgRow) -> Result<IssueRow, sqlx::Error> {
    let issue_type: String = row.try_get("type")?;
    let status: String = row.try_get("status")?;
    let priority: String = row.try_get("priority")?;
    Ok(IssueRow {
        id: row.try_get("id")?,
        project_id: row.try_get("project_id")?,
        title: row.try_get("title")?,
        issue_type: decode_enum(&issue_type, "type", IssueType::parse)?,
        status: decode_enum(&status, "status", IssueStatus::parse)?,
        priority: decode_enum(&priority, "priority", IssuePriority::parse)?,
        list_position: row.try_get("list_position")?,
        description: row.try_get("description")?,
        description_text: row.try_get("description_text")?,
        estimate: row.try_get("estimate")?,
        time_spent: row.try_get("time_spent")?,
        time_remaining: row.try_get("time_remaining")?,
        reporter_id: row.try_get("reporter_id")?,
        assignee_id: row.try_get("assignee_id")?,
        user_ids: row.try_get("user_ids")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

async fn fetch_issue<'e, E>(executor: E, project_id: i64, issue_id: i64) -> Result<IssueRow, IssueError>
where
    E: Executor<'e, Database = Postgres>,
{
    let sql = format!("{ISSUE_SELECT} WHERE i.id = $1 AND i.project_id = $2");
    let row = sqlx::query(&sql)
        .bind(issue_id)
        .bind(project_id)
        .fetch_optional(executor)
        .await?
        .ok_or(IssueError::NotFound(issue_id))?;
    Ok(issue_from_row(&row)?)
}

/// Lock and load every issue position in a project.
async fn lock_positions(tx: &mut Transaction<'_, Postgres>, project_id: i64) -> Result<Vec<PositionedIssue>, IssueError> {
    let rows = sqlx::query("SELECT id, status, list_position FROM issues WHERE project_id = $1 ORDER BY id FOR UPDATE")
        .bind(project_id)
        .fetch_all(&mut **tx)
        .await?;
    rows.iter()
        .map(|row| -> Result<PositionedIssue, IssueError> {
            let status: String = row.get("status");
            Ok(PositionedIssue {
                id: row.get("id"),
                status: decode_enum(&status, "status", IssueStatus::parse)?,
                list_position: row.get("list_position"),
            })
        })
        .collect()
}

/// Write a batch of `(id, list_position)` pairs in one statement.
pub(crate) async fn apply_positions(
    tx: &mut Transaction<'_, Postgres>,
    positions: &[(i64, f64)],
) -> Result<(), sqlx::Error> {
    if positions.is_empty() {
        return Ok(());
    }
    let (ids, values): (Vec<i64>, Vec<f64>) = positions.iter().copied().unzip();
    sqlx::query(
        r"UPDATE issues AS i SET list_position = v.list_position
          FROM UNNEST($1::BIGINT[], $2::DOUBLE PRECISION[]) AS v(id, list_position)
          WHERE i.id = v.id",
    )
    .bind(&ids)
    .bind(&values)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

async fn replace_users(tx: &mut Transaction<'_, Postgres>, issue_id: i64, user_ids: &[Uuid]) -> Result<(), IssueError> {
    sqlx::query("DELETE FROM issue_users WHERE issue_id = $1")
        .bind(issue_id)
        .execute(&mut **tx)
        .await?;
    sqlx::query("INSERT INTO issue_users (issue_id, user_id) SELECT $1, UNNEST($2::UUID[]) ON CONFLICT DO NOTHING")
        .bind(issue_id)
        .bind(unique_users(user_ids))
        .execute(&mut **tx)
        .await
        .map_err(map_write_error)?;
    Ok(())
}

fn issue_data(issue: &IssueRow) -> Data {
    let mut data = Data::new();
    data.insert("issue_id".into(), issue.id.into());
    data.insert("issue".into(), serde_json::to_value(issue).unwrap_or_default());
    data
}

/// `issue:update` payload. A status change can renumber the new column, so
/// the reassigned positions travel with the edited issue.
fn update_data(issue: &IssueRow, renormalized: &[(i64, f64)]) -> Data {
    let mut data = issue_data(issue);
    data.insert("renormalized".into(), renormalized_json(renormalized));
    data
}

// =============================================================================
// QUERIES
// =============================================================================

/// Board issues, filtered, in column order (or most recently updated first
/// when the recent filter is on).
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_issues(
    pool: &PgPool,
    project_id: i64,
    filters: &crate::services::filter::IssueFilters,
    current_user: Option<Uuid>,
) -> Result<Vec<IssueRow>, IssueError> {
    let sql = format!("{ISSUE_SELECT} WHERE i.project_id = $1");
    let rows = sqlx::query(&sql).bind(project_id).fetch_all(pool).await?;
    let now = crate::frame::now_ms();

    let mut issues = rows
        .iter()
        .map(issue_from_row)
        .collect::<Result<Vec<_>, _>>()?;
    issues.retain(|issue| filters.matches(issue, current_user, now));
    sort_for_board(&mut issues, filters.recent);
    Ok(issues)
}

fn sort_for_board(issues: &mut [IssueRow], recent: bool) {
    if recent {
        issues.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(a.id.cmp(&b.id)));
    } else {
        issues.sort_by(|a, b| a.list_position.total_cmp(&b.list_position).then(a.id.cmp(&b.id)));
    }
}

/// Issue with reporter, assignees, and comments (newest first).
///
/// # Errors
///
/// Returns `NotFound` when the issue is not in the project.
pub async fn get_issue_detail(pool: &PgPool, project_id: i64, issue_id: i64) -> Result<IssueDetail, IssueError> {
    let issue = fetch_issue(pool, project_id, issue_id).await?;

    let mut people: Vec<Uuid> = vec![issue.reporter_id];
    people.extend(issue.assignee_id);
    people.extend(issue.user_ids.iter().copied());
    let rows = sqlx::query("SELECT id, name, avatar_url FROM users WHERE id = ANY($1)")
        .bind(unique_users(&people))
        .fetch_all(pool)
        .await?;
    let users: Vec<UserSummary> = rows
        .iter()
        .map(|row| UserSummary { id: row.get("id"), name: row.get("name"), avatar_url: row.get("avatar_url") })
        .collect();

    let find = |id: Uuid| users.iter().find(|u| u.id == id).cloned();
    let reporter = find(issue.reporter_id);
    let mut assignee_ids: Vec<Uuid> = issue.assignee_id.into_iter().collect();
    assignee_ids.extend(issue.user_ids.iter().copied());
    let assignees = unique_users(&assignee_ids).into_iter().filter_map(find).collect();

    let comments = comment::list_comments(pool, project_id, issue_id).await?;
    Ok(IssueDetail { issue, reporter, assignees, comments })
}

fn like_pattern(term: &str) -> String {
    let escaped = term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

/// Case-insensitive substring search over title and description.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn search_issues(pool: &PgPool, project_id: i64, term: &str) -> Result<Vec<IssueRow>, IssueError> {
    let term = term.trim();
    if term.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "{ISSUE_SELECT} WHERE i.project_id = $1 AND (i.title ILIKE $2 OR i.description ILIKE $2 OR i.description_text ILIKE $2) ORDER BY i.updated_at DESC, i.id"
    );
    let rows = sqlx::query(&sql)
        .bind(project_id)
        .bind(like_pattern(term))
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(issue_from_row).collect::<Result<Vec<_>, _>>()?)
}

/// Most recently created issues.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn recent_issues(pool: &PgPool, project_id: i64, limit: i64) -> Result<Vec<IssueRow>, IssueError> {
    let sql = format!("{ISSUE_SELECT} WHERE i.project_id = $1 ORDER BY i.created_at DESC, i.id DESC LIMIT $2");
    let rows = sqlx::query(&sql)
        .bind(project_id)
        .bind(limit.max(0))
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(issue_from_row).collect::<Result<Vec<_>, _>>()?)
}

// =============================================================================
// WRITES
// =============================================================================

/// Create an issue at the head of the backlog.
///
/// # Errors
///
/// Returns `Validation` for bad input or unknown users.
pub async fn create_issue(state: &AppState, project_id: i64, actor: Uuid, new: NewIssue) -> Result<IssueRow, IssueError> {
    let title = validate_title(&new.title)?;
    validate_hours("estimate", new.estimate)?;
    let reporter_id = new.reporter_id.unwrap_or(actor);
    let assignee_id = effective_assignee(new.assignee_id, &new.user_ids);

    let mut tx = state.pool.begin().await?;
    let issues = lock_positions(&mut tx, project_id).await?;
    let backlog = position::sorted_column(&issues, IssueStatus::Backlog);
    let list_position = position::head_position(&backlog);

    let row = sqlx::query(
        r"INSERT INTO issues (project_id, title, type, status, priority, list_position,
                              description, description_text, estimate, reporter_id, assignee_id)
          VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
          RETURNING id",
    )
    .bind(project_id)
    .bind(&title)
    .bind(new.issue_type.as_str())
    .bind(IssueStatus::Backlog.as_str())
    .bind(new.priority.as_str())
    .bind(list_position)
    .bind(&new.description)
    .bind(description_text(new.description.as_deref()))
    .bind(new.estimate)
    .bind(reporter_id)
    .bind(assignee_id)
    .fetch_one(&mut *tx)
    .await
    .map_err(map_write_error)?;
    let issue_id: i64 = row.get("id");

    replace_users(&mut tx, issue_id, &new.user_ids).await?;
    tx.commit().await?;

    let issue = fetch_issue(&state.pool, project_id, issue_id).await?;
    info!(%project_id, issue_id, list_position, "issue created");
    feed::publish(state, project_id, "issue:create", Some(actor), issue_data(&issue)).await;
    Ok(issue)
}

/// Apply a patch to an issue. Changing the status places the issue at the
/// head of its new column.
///
/// # Errors
///
/// Returns `NotFound` for unknown issues and `Validation` for bad input.
pub async fn update_issue(
    state: &AppState,
    project_id: i64,
    actor: Uuid,
    issue_id: i64,
    patch: IssuePatch,
) -> Result<IssueRow, IssueError> {
    let mut tx = state.pool.begin().await?;
    let mut issues = lock_positions(&mut tx, project_id).await?;
    let current = fetch_issue(&mut *tx, project_id, issue_id).await?;

    let title = validate_title(patch.title.as_deref().unwrap_or(&current.title))?;
    let estimate = patch.estimate.unwrap_or(current.estimate);
    let time_spent = patch.time_spent.unwrap_or(current.time_spent);
    let time_remaining = patch.time_remaining.unwrap_or(current.time_remaining);
    validate_hours("estimate", estimate)?;
    validate_hours("time spent", time_spent)?;
    validate_hours("time remaining", time_remaining)?;
    let description = patch.description.unwrap_or(current.description);
    let status = patch.status.unwrap_or(current.status);

    let mut list_position = current.list_position;
    let mut renormalized = Vec::new();
    let mut thin = false;
    if status != current.status {
        let drag = DragMove {
            issue_id,
            source: DropLocation { status: current.status, index: 0 },
            destination: DropLocation { status, index: 0 },
        };
        let plan = position::plan_move(&issues, &drag)?;
        apply_positions(&mut tx, &plan.renormalized).await?;
        apply_plan_in_memory(&mut issues, &drag, plan.list_position, &plan.renormalized);
        thin = column_is_thin(&issues, status, state.config.rebalance_min_gap);
        list_position = plan.list_position;
        renormalized = plan.renormalized;
    }

    let user_ids = patch.user_ids;
    let assignee_id = match patch.assignee_id {
        Some(assignee) => assignee,
        None => current.assignee_id,
    };
    let assignee_id = effective_assignee(assignee_id, user_ids.as_deref().unwrap_or_default());

    sqlx::query(
        r"UPDATE issues SET title = $1, type = $2, status = $3, priority = $4, list_position = $5,
                            description = $6, description_text = $7, estimate = $8, time_spent = $9,
                            time_remaining = $10, reporter_id = $11, assignee_id = $12, updated_at = now()
          WHERE id = $13 AND project_id = $14",
    )
    .bind(&title)
    .bind(patch.issue_type.unwrap_or(current.issue_type).as_str())
    .bind(status.as_str())
    .bind(patch.priority.unwrap_or(current.priority).as_str())
    .bind(list_position)
    .bind(&description)
    .bind(description_text(description.as_deref()))
    .bind(estimate)
    .bind(time_spent)
    .bind(time_remaining)
    .bind(patch.reporter_id.unwrap_or(current.reporter_id))
    .bind(assignee_id)
    .bind(issue_id)
    .bind(project_id)
    .execute(&mut *tx)
    .await
    .map_err(map_write_error)?;

    if let Some(user_ids) = user_ids {
        replace_users(&mut tx, issue_id, &user_ids).await?;
    }
    tx.commit().await?;

    if thin {
        feed::mark_dirty(state, project_id, status).await;
    }

    let issue = fetch_issue(&state.pool, project_id, issue_id).await?;
    info!(%project_id, issue_id, renormalized = renormalized.len(), "issue updated");
    feed::publish(state, project_id, "issue:update", Some(actor), update_data(&issue, &renormalized)).await;
    Ok(issue)
}

/// # Errors
///
/// Returns `NotFound` for unknown issues.
pub async fn delete_issue(state: &AppState, project_id: i64, actor: Uuid, issue_id: i64) -> Result<(), IssueError> {
    let row = sqlx::query("DELETE FROM issues WHERE id = $1 AND project_id = $2 RETURNING status")
        .bind(issue_id)
        .bind(project_id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or(IssueError::NotFound(issue_id))?;
    let status: String = row.get("status");

    info!(%project_id, issue_id, "issue deleted");
    let mut data = Data::new();
    data.insert("issue_id".into(), issue_id.into());
    data.insert("status".into(), status.into());
    feed::publish(state, project_id, "issue:delete", Some(actor), data).await;
    Ok(())
}

/// Attach a user. The first user attached to an unassigned issue becomes its
/// primary assignee.
///
/// # Errors
///
/// Returns `NotFound` for unknown issues and `Validation` for unknown users.
pub async fn add_assignee(
    state: &AppState,
    project_id: i64,
    actor: Uuid,
    issue_id: i64,
    user_id: Uuid,
) -> Result<IssueRow, IssueError> {
    let mut tx = state.pool.begin().await?;
    let updated = sqlx::query(
        r"UPDATE issues SET assignee_id = COALESCE(assignee_id, $3), updated_at = now()
          WHERE id = $1 AND project_id = $2",
    )
    .bind(issue_id)
    .bind(project_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await
    .map_err(map_write_error)?;
    if updated.rows_affected() == 0 {
        return Err(IssueError::NotFound(issue_id));
    }
    sqlx::query("INSERT INTO issue_users (issue_id, user_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
        .bind(issue_id)
        .bind(user_id)
        .execute(&mut *tx)
        .await
        .map_err(map_write_error)?;
    tx.commit().await?;

    let issue = fetch_issue(&state.pool, project_id, issue_id).await?;
    feed::publish(state, project_id, "issue:update", Some(actor), issue_data(&issue)).await;
    Ok(issue)
}

/// Detach a user. If they were the primary assignee, the next remaining user
/// takes over (or nobody).
///
/// # Errors
///
/// Returns `NotFound` for unknown issues.
pub async fn remove_assignee(
    state: &AppState,
    project_id: i64,
    actor: Uuid,
    issue_id: i64,
    user_id: Uuid,
) -> Result<IssueRow, IssueError> {
    let mut tx = state.pool.begin().await?;
    sqlx::query(
        r"DELETE FROM issue_users iu USING issues i
          WHERE iu.issue_id = i.id AND i.id = $1 AND i.project_id = $2 AND iu.user_id = $3",
    )
    .bind(issue_id)
    .bind(project_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;
    let updated = sqlx::query(
        r"UPDATE issues SET
              assignee_id = CASE WHEN assignee_id = $3
                  THEN (SELECT iu.user_id FROM issue_users iu WHERE iu.issue_id = $1 ORDER BY iu.user_id LIMIT 1)
                  ELSE assignee_id END,
              updated_at = now()
          WHERE id = $1 AND project_id = $2",
    )
    .bind(issue_id)
    .bind(project_id)
    .bind(user_id)
    .execute(&mut *tx)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(IssueError::NotFound(issue_id));
    }
    tx.commit().await?;

    let issue = fetch_issue(&state.pool, project_id, issue_id).await?;
    feed::publish(state, project_id, "issue:update", Some(actor), issue_data(&issue)).await;
    Ok(issue)
}

// =============================================================================
// MOVE
// =============================================================================

/// Persist a drag-and-drop move.
///
/// A drop that changes nothing returns the issue's current placement
/// without writing.
///
/// # Errors
///
/// Returns `Position(IssueNotFound)` when the dragged issue is not in the
/// project.
pub async fn move_issue(state: &AppState, project_id: i64, actor: Uuid, drag: DragMove) -> Result<MoveOutcome, IssueError> {
    if !position::is_position_changed(drag.source, Some(drag.destination)) {
        let issue = fetch_issue(&state.pool, project_id, drag.issue_id)
            .await
            .map_err(|err| match err {
                IssueError::NotFound(id) => IssueError::Position(PositionError::IssueNotFound(id)),
                other => other,
            })?;
        return Ok(MoveOutcome {
            issue_id: issue.id,
            status: issue.status,
            list_position: issue.list_position,
            renormalized: Vec::new(),
        });
    }

    let mut tx = state.pool.begin().await?;
    let mut issues = lock_positions(&mut tx, project_id).await?;
    let plan = position::plan_move(&issues, &drag).inspect_err(|err| {
        warn!(%project_id, issue_id = drag.issue_id, error = %err, "move aborted");
    })?;

    sqlx::query("UPDATE issues SET status = $1, list_position = $2, updated_at = now() WHERE id = $3")
        .bind(drag.destination.status.as_str())
        .bind(plan.list_position)
        .bind(drag.issue_id)
        .execute(&mut *tx)
        .await?;
    apply_positions(&mut tx, &plan.renormalized).await?;
    tx.commit().await?;

    let status = drag.destination.status;
    apply_plan_in_memory(&mut issues, &drag, plan.list_position, &plan.renormalized);
    if column_is_thin(&issues, status, state.config.rebalance_min_gap) {
        feed::mark_dirty(state, project_id, status).await;
    }

    if plan.renormalized.is_empty() {
        info!(%project_id, issue_id = drag.issue_id, %status, list_position = plan.list_position, "issue moved");
    } else {
        info!(
            %project_id,
            issue_id = drag.issue_id,
            %status,
            renormalized = plan.renormalized.len(),
            "issue moved; column renormalized"
        );
    }

    let (outcome, data) = settle_move(&drag, plan);
    feed::publish(state, project_id, "issue:move", Some(actor), data).await;
    Ok(outcome)
}

/// Outcome of a planned drop plus its `issue:move` payload. The payload
/// reports the index the issue landed on, not the one requested.
fn settle_move(drag: &DragMove, plan: MovePlan) -> (MoveOutcome, Data) {
    let index = plan.index;
    let outcome = MoveOutcome {
        issue_id: drag.issue_id,
        status: drag.destination.status,
        list_position: plan.list_position,
        renormalized: plan.renormalized,
    };
    let data = move_data(&outcome, index);
    (outcome, data)
}

/// Whether a column's tightest gap is below the sweep threshold.
fn column_is_thin(issues: &[PositionedIssue], status: IssueStatus, min_gap: f64) -> bool {
    let column = position::sorted_column(issues, status);
    position::min_gap(&column).is_some_and(|gap| gap < min_gap)
}

fn apply_plan_in_memory(issues: &mut [PositionedIssue], drag: &DragMove, list_position: f64, renormalized: &[(i64, f64)]) {
    for issue in issues.iter_mut() {
        if issue.id == drag.issue_id {
            issue.status = drag.destination.status;
            issue.list_position = list_position;
        } else if let Some((_, pos)) = renormalized.iter().find(|(id, _)| *id == issue.id) {
            issue.list_position = *pos;
        }
    }
}

fn renormalized_json(renormalized: &[(i64, f64)]) -> serde_json::Value {
    renormalized
        .iter()
        .map(|(id, pos)| serde_json::json!({ "id": id, "list_position": pos }))
        .collect::<Vec<_>>()
        .into()
}

fn move_data(outcome: &MoveOutcome, index: usize) -> Data {
    let renormalized = renormalized_json(&outcome.renormalized);
    let mut data = Data::new();
    data.insert("issue_id".into(), outcome.issue_id.into());
    data.insert("status".into(), outcome.status.as_str().into());
    data.insert("list_position".into(), outcome.list_position.into());
    data.insert("index".into(), index.into());
    data.insert("renormalized".into(), renormalized);
    data
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;

    /// A backlog issue with no people attached beyond a random reporter.
    #[must_use]
    pub fn issue(id: i64) -> IssueRow {
        IssueRow {
            id,
            project_id: 1,
            title: format!("issue {id}"),
            issue_type: IssueType::Task,
            status: IssueStatus::Backlog,
            priority: IssuePriority::Medium,
            list_position: 1.0,
            description: None,
            description_text: None,
            estimate: None,
            time_spent: None,
            time_remaining: None,
            reporter_id: Uuid::new_v4(),
            assignee_id: None,
            user_ids: Vec::new(),
            created_at: 0,
            updated_at: 1_700_000_000_000,
        }
    }
}

#[cfg(test)]
#[path = "issue_test.rs"]
mod tests;
