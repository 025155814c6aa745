//! Rebalance service — background renormalization of crowded columns.
//!
//! DESIGN
//! ======
//! Repeated drops into the same gap halve it each time. `plan_move` repairs a
//! column once the gap is gone entirely; this sweep repairs it earlier, while
//! positions are merely close, so interactive moves rarely pay for a
//! renormalization.
//!
//! Moves mark `(project, status)` dirty. Each tick snapshots and clears the
//! dirty set under the lock, then does the database work lock-free.
//!
//! ERROR HANDLING
//! ==============
//! A column whose rebalance fails is marked dirty again and retried on the
//! next tick. Rewriting a column twice is harmless; skipping it is not.

use std::time::Duration;

use sqlx::Row;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{error, info};

use crate::db::decode_enum;
use crate::frame::Data;
use crate::model::IssueStatus;
use crate::position::{self, PositionedIssue};
use crate::services::feed;
use crate::services::issue::apply_positions;
use crate::state::AppState;

/// One project column waiting for the sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DirtyColumn {
    pub(crate) project_id: i64,
    pub(crate) status: IssueStatus,
}

/// Spawn the background rebalance task. Returns a handle for shutdown.
pub fn spawn_rebalance_task(state: AppState) -> JoinHandle<()> {
    let interval_ms = state.config.rebalance_interval_ms.max(1);
    info!(interval_ms, min_gap = state.config.rebalance_min_gap, "rebalance sweep configured");
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            ticker.tick().await;
            sweep(&state).await;
        }
    })
}

/// Whether a sorted column is crowded enough to renormalize.
#[must_use]
pub fn needs_rebalance(column: &[PositionedIssue], min_gap: f64) -> bool {
    position::min_gap(column).is_some_and(|gap| gap.is_nan() || gap < min_gap)
}

/// Renormalized positions that differ from the current ones.
fn changed_positions(column: &[PositionedIssue]) -> Vec<(i64, f64)> {
    position::renormalize(column)
        .into_iter()
        .zip(column)
        .filter(|((_, new), issue)| issue.list_position.total_cmp(new).is_ne())
        .map(|(pair, _)| pair)
        .collect()
}

async fn sweep(state: &AppState) {
    for column in take_dirty(state).await {
        match rebalance_column(state, column).await {
            Ok(0) => {}
            Ok(count) => {
                info!(project_id = column.project_id, status = %column.status, count, "column rebalanced");
            }
            Err(e) => {
                error!(error = %e, project_id = column.project_id, status = %column.status, "rebalance failed; will retry");
                feed::mark_dirty(state, column.project_id, column.status).await;
            }
        }
    }
}

#[cfg(test)]
pub(crate) async fn sweep_for_tests(state: &AppState) {
    sweep(state).await;
}

/// Snapshot and clear every dirty column, evicting projects left idle.
pub(crate) async fn take_dirty(state: &AppState) -> Vec<DirtyColumn> {
    let mut projects = state.projects.write().await;
    let mut collected = Vec::new();
    for (project_id, project) in projects.iter_mut() {
        let statuses: Vec<IssueStatus> = project.dirty.drain().collect();
        collected.extend(statuses.into_iter().map(|status| DirtyColumn { project_id: *project_id, status }));
    }
    projects.retain(|_, project| !project.is_idle());
    collected.sort_by_key(|c| (c.project_id, c.status));
    collected
}

/// Renormalize one column if it is crowded. Returns how many issues moved.
async fn rebalance_column(state: &AppState, column: DirtyColumn) -> Result<usize, sqlx::Error> {
    let mut tx = state.pool.begin().await?;
    let rows = sqlx::query(
        "SELECT id, status, list_position FROM issues WHERE project_id = $1 AND status = $2 ORDER BY id FOR UPDATE",
    )
    .bind(column.project_id)
    .bind(column.status.as_str())
    .fetch_all(&mut *tx)
    .await?;

    let issues = rows
        .iter()
        .map(|row| -> Result<PositionedIssue, sqlx::Error> {
            let status: String = row.get("status");
            Ok(PositionedIssue {
                id: row.get("id"),
                status: decode_enum(&status, "status", IssueStatus::parse)?,
                list_position: row.get("list_position"),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    let sorted = position::sorted_column(&issues, column.status);

    if !needs_rebalance(&sorted, state.config.rebalance_min_gap) {
        tx.rollback().await?;
        return Ok(0);
    }

    let changed = changed_positions(&sorted);
    apply_positions(&mut tx, &changed).await?;
    tx.commit().await?;

    let positions: Vec<serde_json::Value> = changed
        .iter()
        .map(|(id, pos)| serde_json::json!({ "id": id, "list_position": pos }))
        .collect();
    let mut data = Data::new();
    data.insert("status".into(), column.status.as_str().into());
    data.insert("positions".into(), positions.into());
    feed::publish(state, column.project_id, "issue:rebalance", None, data).await;

    Ok(changed.len())
}

#[cfg(test)]
#[path = "rebalance_test.rs"]
mod tests;
