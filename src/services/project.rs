//! Project service — project settings and membership.

use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use tracing::info;

use crate::db::decode_enum;
use crate::frame::ErrorCode;
use crate::model::{ProjectCategory, UserSummary, nullable};
use crate::services::session::SessionUser;

const MAX_NAME_LEN: usize = 100;

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("project not found: {0}")]
    NotFound(i64),
    #[error("user has no project")]
    NoProject,
    #[error("{0}")]
    Validation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for ProjectError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_PROJECT_NOT_FOUND",
            Self::NoProject => "E_NO_PROJECT",
            Self::Validation(_) => "E_VALIDATION",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: i64,
    pub name: String,
    pub url: Option<String>,
    pub description: Option<String>,
    pub category: ProjectCategory,
    pub created_at: i64,
    pub updated_at: i64,
    pub users: Vec<UserSummary>,
}

/// Partial update from the project settings form.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProjectPatch {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub url: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    pub category: Option<ProjectCategory>,
}

// =============================================================================
// VALIDATION
// =============================================================================

/// # Errors
///
/// Rejects blank names and names over the length limit.
pub fn validate_name(name: &str) -> Result<String, ProjectError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ProjectError::Validation("name is required".into()));
    }
    if trimmed.chars().count() > MAX_NAME_LEN {
        return Err(ProjectError::Validation(format!("name must be at most {MAX_NAME_LEN} characters")));
    }
    Ok(trimmed.to_owned())
}

/// Blank urls clear the field; anything else must be an http(s) url with a host.
///
/// # Errors
///
/// Returns `Validation` for malformed urls.
pub fn validate_url(url: Option<&str>) -> Result<Option<String>, ProjectError> {
    let Some(url) = url.map(str::trim).filter(|u| !u.is_empty()) else {
        return Ok(None);
    };
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| ProjectError::Validation("url must start with http:// or https://".into()))?;
    let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(ProjectError::Validation("url must include a host".into()));
    }
    Ok(Some(url.to_owned()))
}

// =============================================================================
// QUERIES
// =============================================================================

/// The project a signed-in user works in.
///
/// # Errors
///
/// Returns `NoProject` when the user has not been assigned one.
pub fn project_for_user(user: &SessionUser) -> Result<i64, ProjectError> {
    user.project_id.ok_or(ProjectError::NoProject)
}

/// Members of a project, ordered by name.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_users(pool: &PgPool, project_id: i64) -> Result<Vec<UserSummary>, ProjectError> {
    let rows = sqlx::query("SELECT id, name, avatar_url FROM users WHERE project_id = $1 ORDER BY name, id")
        .bind(project_id)
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| UserSummary { id: row.get("id"), name: row.get("name"), avatar_url: row.get("avatar_url") })
        .collect())
}

/// Load a project with its users.
///
/// # Errors
///
/// Returns `NotFound` if the project does not exist.
pub async fn get_project(pool: &PgPool, project_id: i64) -> Result<Project, ProjectError> {
    let row = sqlx::query(
        r"SELECT id, name, url, description, category,
                 (EXTRACT(EPOCH FROM created_at) * 1000)::BIGINT AS created_at,
                 (EXTRACT(EPOCH FROM updated_at) * 1000)::BIGINT AS updated_at
          FROM projects WHERE id = $1",
    )
    .bind(project_id)
    .fetch_optional(pool)
    .await?
    .ok_or(ProjectError::NotFound(project_id))?;

    let category: String = row.get("category");
    Ok(Project {
        id: row.get("id"),
        name: row.get("name"),
        url: row.get("url"),
        description: row.get("description"),
        category: decode_enum(&category, "category", ProjectCategory::parse)?,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        users: list_users(pool, project_id).await?,
    })
}

/// Apply a settings patch and return the updated project.
///
/// # Errors
///
/// Returns `Validation` for bad input and `NotFound` for unknown projects.
pub async fn update_project(pool: &PgPool, project_id: i64, patch: ProjectPatch) -> Result<Project, ProjectError> {
    let current = get_project(pool, project_id).await?;

    let name = validate_name(patch.name.as_deref().unwrap_or(&current.name))?;
    let url = match patch.url {
        Some(url) => validate_url(url.as_deref())?,
        None => current.url,
    };
    let description = patch.description.unwrap_or(current.description);
    let category = patch.category.unwrap_or(current.category);

    sqlx::query(
        "UPDATE projects SET name = $1, url = $2, description = $3, category = $4, updated_at = now() WHERE id = $5",
    )
    .bind(&name)
    .bind(&url)
    .bind(&description)
    .bind(category.as_str())
    .bind(project_id)
    .execute(pool)
    .await?;

    info!(%project_id, %name, "updated project");
    get_project(pool, project_id).await
}

#[cfg(test)]
#[path = "project_test.rs"]
mod tests;
