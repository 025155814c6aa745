//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! Issues, comments, and projects live in Postgres and are read fresh on
//! every request. The only in-memory state is per-project realtime state:
//! the websocket subscribers to notify, and the columns whose positions
//! were touched since the last rebalance sweep.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::Config;
use crate::frame::Frame;
use crate::model::IssueStatus;

// =============================================================================
// PROJECT STATE
// =============================================================================

/// Live state for one project. Created on first subscribe or first move and
/// evicted once it has neither subscribers nor pending rebalance work.
pub struct ProjectState {
    /// Subscribed clients: `client_id` -> sender for outgoing frames.
    pub clients: HashMap<Uuid, mpsc::Sender<Frame>>,
    /// Columns reordered since the last rebalance sweep.
    pub dirty: HashSet<IssueStatus>,
}

impl ProjectState {
    #[must_use]
    pub fn new() -> Self {
        Self { clients: HashMap::new(), dirty: HashSet::new() }
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.clients.is_empty() && self.dirty.is_empty()
    }
}

impl Default for ProjectState {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<Config>,
    pub projects: Arc<RwLock<HashMap<i64, ProjectState>>>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, config: Config) -> Self {
        Self { pool, config: Arc::new(config), projects: Arc::new(RwLock::new(HashMap::new())) }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;
    use sqlx::postgres::PgPoolOptions;

    /// A test `AppState` with a lazily connected pool (no live DB).
    #[must_use]
    pub fn test_app_state() -> AppState {
        let config = Config::for_tests();
        let pool = PgPoolOptions::new()
            .connect_lazy(&config.database_url)
            .expect("connect_lazy should not fail");
        AppState::new(pool, config)
    }

    /// Subscribe a fresh client to a project and return its id and receiver.
    pub async fn seed_subscriber(state: &AppState, project_id: i64) -> (Uuid, mpsc::Receiver<Frame>) {
        let client_id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(16);
        let mut projects = state.projects.write().await;
        projects
            .entry(project_id)
            .or_default()
            .clients
            .insert(client_id, tx);
        (client_id, rx)
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
