//! WebSocket handler — realtime change feed.
//!
//! DESIGN
//! ======
//! The socket is read-mostly: clients subscribe to their project's feed and
//! then receive `event` frames for every issue and comment change. Mutations
//! go through the HTTP API; the feed only tells other tabs to catch up.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade with a one-time `?ticket=` → send `session:connected`
//! 2. `feed:subscribe` → join the caller's project feed (reply `done`)
//! 3. Feed events are forwarded as they arrive
//! 4. `feed:unsubscribe` or close → leave the feed

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::frame::{Data, ErrorCode, Frame};
use crate::services::{feed, session};
use crate::state::AppState;

const CLIENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, thiserror::Error)]
pub(crate) enum WsError {
    #[error("not a member of project {0}")]
    Forbidden(i64),
    #[error("user has no project")]
    NoProject,
    #[error("unknown syscall: {0}")]
    UnknownSyscall(String),
}

impl ErrorCode for WsError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Forbidden(_) => "E_FORBIDDEN",
            Self::NoProject => "E_NO_PROJECT",
            Self::UnknownSyscall(_) => "E_UNKNOWN_SYSCALL",
        }
    }
}

/// Per-connection state.
pub(crate) struct Connection {
    pub(crate) client_id: Uuid,
    pub(crate) user: session::SessionUser,
    /// Project feed this connection is subscribed to.
    pub(crate) subscribed: Option<i64>,
    pub(crate) tx: mpsc::Sender<Frame>,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let Some(ticket) = params.get("ticket") else {
        return (StatusCode::UNAUTHORIZED, "ticket required").into_response();
    };

    let user = match session::consume_ws_ticket(&state.pool, ticket).await {
        Ok(Some(user)) => user,
        Ok(None) => return (StatusCode::UNAUTHORIZED, "invalid or expired ticket").into_response(),
        Err(e) => {
            tracing::error!(error = %e, "ws ticket validation failed");
            return (StatusCode::INTERNAL_SERVER_ERROR, "ticket validation error").into_response();
        }
    };

    ws.on_upgrade(move |socket| run_ws(socket, state, user))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, user: session::SessionUser) {
    let (tx, mut rx) = mpsc::channel::<Frame>(CLIENT_CHANNEL_CAPACITY);
    let mut conn = Connection { client_id: Uuid::new_v4(), user, subscribed: None, tx };

    let mut welcome = Frame::request("session:connected", Data::new())
        .with_data("client_id", conn.client_id.to_string())
        .with_data("user_id", conn.user.id.to_string());
    if let Some(project_id) = conn.user.project_id {
        welcome = welcome.with_data("project_id", project_id);
    }
    if send_frame(&mut socket, &welcome).await.is_err() {
        return;
    }

    info!(client_id = %conn.client_id, user_id = %conn.user.id, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        for frame in process_inbound_text(&state, &mut conn, &text).await {
                            let _ = send_frame(&mut socket, &frame).await;
                        }
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(frame) = rx.recv() => {
                if send_frame(&mut socket, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(project_id) = conn.subscribed.take() {
        feed::unsubscribe(&state, project_id, conn.client_id).await;
    }
    info!(client_id = %conn.client_id, "ws: client disconnected");
}

async fn send_frame(socket: &mut WebSocket, frame: &Frame) -> Result<(), axum::Error> {
    let json = serde_json::to_string(frame).unwrap_or_default();
    socket.send(Message::Text(json.into())).await
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Parse and handle one inbound text frame; returns frames for the sender.
pub(crate) async fn process_inbound_text(state: &AppState, conn: &mut Connection, text: &str) -> Vec<Frame> {
    let mut req: Frame = match serde_json::from_str(text) {
        Ok(r) => r,
        Err(e) => {
            warn!(client_id = %conn.client_id, error = %e, "ws: invalid inbound frame");
            let err = Frame::request("gateway:error", Data::new()).with_data("message", format!("invalid json: {e}"));
            return vec![err];
        }
    };
    // Replies to server frames need no answer.
    if req.status.is_terminal() {
        return Vec::new();
    }
    req.from = Some(conn.user.id);
    info!(client_id = %conn.client_id, id = %req.id, syscall = %req.syscall, "ws: recv frame");

    let result = match (req.prefix(), req.op()) {
        ("feed", "subscribe") => subscribe(state, conn, &req).await,
        ("feed", "unsubscribe") => {
            unsubscribe(state, conn).await;
            Ok(req.done())
        }
        _ => Err(WsError::UnknownSyscall(req.syscall.clone())),
    };

    match result {
        Ok(reply) => vec![reply],
        Err(err) => vec![req.error_from(&err)],
    }
}

/// Subscribe to the requested project (defaults to the user's own). Only the
/// user's project is allowed. Switching projects leaves the previous feed.
async fn subscribe(state: &AppState, conn: &mut Connection, req: &Frame) -> Result<Frame, WsError> {
    let own = conn.user.project_id.ok_or(WsError::NoProject)?;
    let requested = req
        .project_id
        .or_else(|| req.data.get("project_id").and_then(serde_json::Value::as_i64))
        .unwrap_or(own);
    if requested != own {
        return Err(WsError::Forbidden(requested));
    }

    if conn.subscribed != Some(requested) {
        unsubscribe(state, conn).await;
        feed::subscribe(state, requested, conn.client_id, conn.tx.clone()).await;
        conn.subscribed = Some(requested);
    }

    let mut data = Data::new();
    data.insert("subscribers".into(), feed::subscriber_count(state, requested).await.into());
    Ok(req.done_with(data).with_project_id(requested))
}

async fn unsubscribe(state: &AppState, conn: &mut Connection) {
    if let Some(project_id) = conn.subscribed.take() {
        feed::unsubscribe(state, project_id, conn.client_id).await;
    }
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
