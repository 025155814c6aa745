//! Domain vocabulary: issue statuses, types, priorities, project categories.
//!
//! DESIGN
//! ======
//! Each enum stores as its lowercase string form in Postgres and on the wire,
//! so the database, the JSON API, and websocket frames all agree on one
//! spelling. `parse` is lenient about case and whitespace because values
//! arrive from query strings and form fields.

use serde::{Deserialize, Serialize};

// =============================================================================
// ISSUE STATUS
// =============================================================================

/// Board column an issue sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueStatus {
    Backlog,
    Selected,
    #[serde(rename = "inprogress")]
    InProgress,
    Done,
}

impl IssueStatus {
    /// Board columns in display order.
    pub const ALL: [IssueStatus; 4] = [Self::Backlog, Self::Selected, Self::InProgress, Self::Done];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Selected => "selected",
            Self::InProgress => "inprogress",
            Self::Done => "done",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Backlog => "Backlog",
            Self::Selected => "Selected for development",
            Self::InProgress => "In progress",
            Self::Done => "Done",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "backlog" => Some(Self::Backlog),
            "selected" => Some(Self::Selected),
            "inprogress" => Some(Self::InProgress),
            "done" => Some(Self::Done),
            _ => None,
        }
    }
}

impl std::fmt::Display for IssueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// ISSUE TYPE
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueType {
    Task,
    Bug,
    Story,
}

impl IssueType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Task => "task",
            Self::Bug => "bug",
            Self::Story => "story",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "task" => Some(Self::Task),
            "bug" => Some(Self::Bug),
            "story" => Some(Self::Story),
            _ => None,
        }
    }
}

// =============================================================================
// ISSUE PRIORITY
// =============================================================================

/// Priority stored as the digits `"1"` (lowest) through `"5"` (highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssuePriority {
    #[serde(rename = "1")]
    Lowest,
    #[serde(rename = "2")]
    Low,
    #[serde(rename = "3")]
    Medium,
    #[serde(rename = "4")]
    High,
    #[serde(rename = "5")]
    Highest,
}

impl IssuePriority {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lowest => "1",
            Self::Low => "2",
            Self::Medium => "3",
            Self::High => "4",
            Self::Highest => "5",
        }
    }

    /// Accepts either the stored digit or the priority name.
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "lowest" => Some(Self::Lowest),
            "2" | "low" => Some(Self::Low),
            "3" | "medium" => Some(Self::Medium),
            "4" | "high" => Some(Self::High),
            "5" | "highest" => Some(Self::Highest),
            _ => None,
        }
    }
}

// =============================================================================
// PROJECT CATEGORY
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectCategory {
    Software,
    Marketing,
    Business,
}

impl ProjectCategory {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Software => "software",
            Self::Marketing => "marketing",
            Self::Business => "business",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "software" => Some(Self::Software),
            "marketing" => Some(Self::Marketing),
            "business" => Some(Self::Business),
            _ => None,
        }
    }
}

// =============================================================================
// USERS
// =============================================================================

/// Public face of a user: what boards, comments, and avatars need.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub id: uuid::Uuid,
    pub name: String,
    pub avatar_url: Option<String>,
}

// =============================================================================
// SERDE HELPERS
// =============================================================================

/// Distinguishes an absent patch field (`None`) from an explicit `null`
/// (`Some(None)`). Use with `#[serde(default, deserialize_with = "nullable")]`.
pub(crate) fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
#[path = "model_test.rs"]
mod tests;
