//! Fractional list positions for board columns.
//!
//! DESIGN
//! ======
//! Every issue carries a real-valued `list_position`; a column is the set of
//! issues with one status sorted by that key. Dropping an issue computes a
//! key between its new neighbors so no other issue has to move:
//!
//! - empty column      -> `1`
//! - head of a column  -> `next - 1`
//! - tail of a column  -> `prev + 1`
//! - between two       -> `prev + (next - prev) / 2`
//!
//! Repeated drops into the same gap halve it each time, so after a few dozen
//! inserts the average collapses onto a neighbor. `plan_move` detects that
//! (or tied neighbors) and falls back to renormalizing the destination column
//! to `1, 2, 3, …`. The background rebalance sweep uses `min_gap` to catch
//! columns before they get that far.
//!
//! Everything here is pure: callers own persistence and broadcasting.

use serde::{Deserialize, Serialize};

use crate::model::IssueStatus;

// =============================================================================
// TYPES
// =============================================================================

/// The slice of an issue the reorder computation needs.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionedIssue {
    pub id: i64,
    pub status: IssueStatus,
    pub list_position: f64,
}

/// A column and an index within it, as reported by the drag source/target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropLocation {
    pub status: IssueStatus,
    pub index: usize,
}

/// One drag-end event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DragMove {
    pub issue_id: i64,
    pub source: DropLocation,
    pub destination: DropLocation,
}

/// Result of planning a drop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MovePlan {
    /// New position for the dragged issue.
    pub list_position: f64,
    /// Index the dragged issue lands on after clamping to the column length.
    pub index: usize,
    /// Other destination-column issues whose positions were reassigned.
    /// Empty unless the gap between the neighbors was exhausted.
    pub renormalized: Vec<(i64, f64)>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PositionError {
    #[error("dragged issue not found: {0}")]
    IssueNotFound(i64),
}

impl crate::frame::ErrorCode for PositionError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::IssueNotFound(_) => "E_ISSUE_NOT_FOUND",
        }
    }
}

// =============================================================================
// DROP DETECTION
// =============================================================================

/// Whether a drag actually changed anything. A drop outside any column has
/// no destination.
#[must_use]
pub fn is_position_changed(source: DropLocation, destination: Option<DropLocation>) -> bool {
    let Some(destination) = destination else {
        return false;
    };
    destination.status != source.status || destination.index != source.index
}

// =============================================================================
// COLUMN ORDERING
// =============================================================================

/// Issues of one column ordered by position, ties broken by id.
#[must_use]
pub fn sorted_column(issues: &[PositionedIssue], status: IssueStatus) -> Vec<PositionedIssue> {
    let mut column: Vec<PositionedIssue> = issues
        .iter()
        .filter(|issue| issue.status == status)
        .copied()
        .collect();
    column.sort_by(|a, b| {
        a.list_position
            .total_cmp(&b.list_position)
            .then(a.id.cmp(&b.id))
    });
    column
}

/// Smallest distance between adjacent positions of a sorted column.
#[must_use]
pub fn min_gap(column: &[PositionedIssue]) -> Option<f64> {
    column
        .windows(2)
        .map(|pair| pair[1].list_position - pair[0].list_position)
        .min_by(f64::total_cmp)
}

/// Reassign `1, 2, 3, …` in the column's current order.
#[must_use]
pub fn renormalize(column: &[PositionedIssue]) -> Vec<(i64, f64)> {
    column
        .iter()
        .enumerate()
        .map(|(i, issue)| (issue.id, slot_position(i)))
        .collect()
}

#[allow(clippy::cast_precision_loss)]
fn slot_position(index: usize) -> f64 {
    (index + 1) as f64
}

// =============================================================================
// POSITION COMPUTATION
// =============================================================================

/// Key that sorts between `prev` and `next`.
#[must_use]
pub fn between(prev: Option<f64>, next: Option<f64>) -> f64 {
    match (prev, next) {
        (None, None) => 1.0,
        (None, Some(next)) => next - 1.0,
        (Some(prev), None) => prev + 1.0,
        (Some(prev), Some(next)) => prev + (next - prev) / 2.0,
    }
}

/// Position for a new issue placed at the head of a sorted column.
#[must_use]
pub fn head_position(column: &[PositionedIssue]) -> f64 {
    between(None, column.first().map(|issue| issue.list_position))
}

/// Whether `candidate` sorts strictly between the neighbors that exist.
#[must_use]
pub fn has_room(prev: Option<f64>, next: Option<f64>, candidate: f64) -> bool {
    candidate.is_finite() && prev.is_none_or(|p| candidate > p) && next.is_none_or(|n| candidate < n)
}

/// Positions immediately before and after the dragged issue once it has
/// been dropped into the destination column.
///
/// # Errors
///
/// Returns `IssueNotFound` if the dragged issue is not in `issues`.
pub fn neighbors_after_drop(
    issues: &[PositionedIssue],
    drag: &DragMove,
) -> Result<(Option<f64>, Option<f64>), PositionError> {
    let (column, index) = column_after_drop(issues, drag)?;
    Ok(neighbors_at(&column, index))
}

/// New position for the dragged issue.
///
/// # Errors
///
/// Returns `IssueNotFound` if the dragged issue is not in `issues`.
pub fn compute_list_position(issues: &[PositionedIssue], drag: &DragMove) -> Result<f64, PositionError> {
    let (prev, next) = neighbors_after_drop(issues, drag)?;
    Ok(between(prev, next))
}

/// Plan a drop, renormalizing the destination column when the averaged key
/// would not sort strictly between the neighbors.
///
/// # Errors
///
/// Returns `IssueNotFound` if the dragged issue is not in `issues`.
pub fn plan_move(issues: &[PositionedIssue], drag: &DragMove) -> Result<MovePlan, PositionError> {
    let candidate = compute_list_position(issues, drag)?;
    let (column, index) = column_after_drop(issues, drag)?;
    let (prev, next) = neighbors_at(&column, index);
    if has_room(prev, next, candidate) {
        return Ok(MovePlan { list_position: candidate, index, renormalized: Vec::new() });
    }

    let mut renormalized = renormalize(&column);
    let list_position = slot_position(index);
    renormalized.retain(|(id, _)| *id != drag.issue_id);
    Ok(MovePlan { list_position, index, renormalized })
}

// =============================================================================
// HELPERS
// =============================================================================

/// The destination column as it looks after the drop, plus the index the
/// dragged issue ended up on.
///
/// Within one column this is a move (remove, then insert); across columns it
/// is an insert. Removing the dragged issue first covers both.
fn column_after_drop(
    issues: &[PositionedIssue],
    drag: &DragMove,
) -> Result<(Vec<PositionedIssue>, usize), PositionError> {
    let dropped = issues
        .iter()
        .find(|issue| issue.id == drag.issue_id)
        .copied()
        .ok_or(PositionError::IssueNotFound(drag.issue_id))?;

    let mut column = sorted_column(issues, drag.destination.status);
    column.retain(|issue| issue.id != dropped.id);

    let index = drag.destination.index.min(column.len());
    column.insert(index, PositionedIssue { status: drag.destination.status, ..dropped });
    Ok((column, index))
}

fn neighbors_at(column: &[PositionedIssue], index: usize) -> (Option<f64>, Option<f64>) {
    let prev = index
        .checked_sub(1)
        .and_then(|i| column.get(i))
        .map(|issue| issue.list_position);
    let next = column.get(index + 1).map(|issue| issue.list_position);
    (prev, next)
}

#[cfg(test)]
#[path = "position_test.rs"]
mod tests;
