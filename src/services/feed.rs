//! Feed service — project subscriptions and change-event fan-out.
//!
//! DESIGN
//! ======
//! Each websocket connection subscribes to at most one project. Mutating
//! services call `publish` after their write commits, so subscribers never
//! see an event for data they cannot read back yet. Clients reconcile by
//! re-fetching; events carry enough data to update a board without it.
//!
//! Fan-out is best-effort: a subscriber whose channel is full misses the
//! event rather than stalling the publisher.

use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::frame::{Data, Frame};
use crate::model::IssueStatus;
use crate::state::{AppState, ProjectState};

/// Register a client for a project's events.
pub async fn subscribe(state: &AppState, project_id: i64, client_id: Uuid, tx: mpsc::Sender<Frame>) {
    let mut projects = state.projects.write().await;
    let project = projects.entry(project_id).or_insert_with(ProjectState::new);
    project.clients.insert(client_id, tx);
    info!(%project_id, %client_id, clients = project.clients.len(), "client subscribed to project feed");
}

/// Remove a client. Evicts the project state once nothing references it.
pub async fn unsubscribe(state: &AppState, project_id: i64, client_id: Uuid) {
    let mut projects = state.projects.write().await;
    let Some(project) = projects.get_mut(&project_id) else {
        return;
    };

    project.clients.remove(&client_id);
    info!(%project_id, %client_id, remaining = project.clients.len(), "client left project feed");

    if project.is_idle() {
        projects.remove(&project_id);
        info!(%project_id, "evicted project state");
    }
}

/// Number of live subscribers for a project.
pub async fn subscriber_count(state: &AppState, project_id: i64) -> usize {
    let projects = state.projects.read().await;
    projects.get(&project_id).map_or(0, |p| p.clients.len())
}

/// Send a frame to every subscriber of a project, optionally excluding one.
pub async fn broadcast(state: &AppState, project_id: i64, frame: &Frame, exclude: Option<Uuid>) {
    let projects = state.projects.read().await;
    let Some(project) = projects.get(&project_id) else {
        return;
    };

    for (client_id, tx) in &project.clients {
        if exclude == Some(*client_id) {
            continue;
        }
        let _ = tx.try_send(frame.clone());
    }
}

/// Build and broadcast a change event attributed to `actor`.
pub async fn publish(state: &AppState, project_id: i64, syscall: &str, actor: Option<Uuid>, data: Data) {
    let mut frame = Frame::event(syscall, project_id, data);
    if let Some(actor) = actor {
        frame = frame.with_from(actor);
    }
    broadcast(state, project_id, &frame, None).await;
}

/// Flag a column for the rebalance sweep.
pub async fn mark_dirty(state: &AppState, project_id: i64, status: IssueStatus) {
    let mut projects = state.projects.write().await;
    projects
        .entry(project_id)
        .or_insert_with(ProjectState::new)
        .dirty
        .insert(status);
}

#[cfg(test)]
#[path = "feed_test.rs"]
mod tests;
