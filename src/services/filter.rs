//! Board filters: free-text search, user avatars, "only my issues", and
//! "recently updated".
//!
//! Filters are applied after loading a project's issues. A project board is
//! small enough that doing this in Rust keeps the SQL trivial and lets the
//! same predicate run in tests without a database.

use std::collections::HashSet;

use serde::Deserialize;
use uuid::Uuid;

use crate::services::issue::IssueRow;

/// Window for the "recently updated" filter.
pub const RECENT_WINDOW_MS: i64 = 3 * 24 * 60 * 60 * 1000;

/// Raw query string for `GET /api/issues`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterQuery {
    pub search_term: Option<String>,
    /// Comma separated user ids.
    pub user_ids: Option<String>,
    pub my_only: Option<bool>,
    pub recent: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueFilters {
    pub search_term: String,
    pub user_ids: HashSet<Uuid>,
    pub my_only: bool,
    pub recent: bool,
}

impl From<FilterQuery> for IssueFilters {
    fn from(query: FilterQuery) -> Self {
        let user_ids = query
            .user_ids
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .filter_map(|raw| Uuid::parse_str(raw.trim()).ok())
            .collect();
        Self {
            search_term: query.search_term.unwrap_or_default().trim().to_owned(),
            user_ids,
            my_only: query.my_only.unwrap_or(false),
            recent: query.recent.unwrap_or(false),
        }
    }
}

impl IssueFilters {
    #[must_use]
    pub fn is_cleared(&self) -> bool {
        self.search_term.is_empty() && self.user_ids.is_empty() && !self.my_only && !self.recent
    }

    /// Whether an issue passes every active filter.
    #[must_use]
    pub fn matches(&self, issue: &IssueRow, current_user: Option<Uuid>, now_ms: i64) -> bool {
        if !self.search_term.is_empty() {
            let needle = self.search_term.to_lowercase();
            let in_title = issue.title.to_lowercase().contains(&needle);
            let in_text = issue
                .description_text
                .as_deref()
                .is_some_and(|text| text.to_lowercase().contains(&needle));
            if !in_title && !in_text {
                return false;
            }
        }

        if !self.user_ids.is_empty() && !involved_users(issue).any(|id| self.user_ids.contains(&id)) {
            return false;
        }

        if self.my_only {
            let Some(me) = current_user else {
                return false;
            };
            if issue.reporter_id != me && !involved_users(issue).any(|id| id == me) {
                return false;
            }
        }

        if self.recent && now_ms - issue.updated_at > RECENT_WINDOW_MS {
            return false;
        }

        true
    }
}

fn involved_users(issue: &IssueRow) -> impl Iterator<Item = Uuid> + '_ {
    issue.assignee_id.into_iter().chain(issue.user_ids.iter().copied())
}

/// Column header count: `"shown of all"` while filtering hides issues.
#[must_use]
pub fn format_count(all: usize, shown: usize) -> String {
    if all == shown {
        all.to_string()
    } else {
        format!("{shown} of {all}")
    }
}

#[cfg(test)]
#[path = "filter_test.rs"]
mod tests;
