//! Router assembly.
//!
//! SYSTEM CONTEXT
//! ==============
//! This module binds the JSON API and the realtime websocket under a single
//! Axum router. Every `/api` route except login requires a session; project
//! scoping happens in the handlers via `AuthUser::project_id`.

pub mod auth;
pub mod comments;
pub mod issues;
pub mod projects;
pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{delete, get, patch, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full application router.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/me", get(auth::me))
        .route("/api/auth/ws-ticket", post(auth::ws_ticket))
        .route("/api/project", get(projects::get_project).patch(projects::update_project))
        .route("/api/project/users", get(projects::list_users))
        .route("/api/board", get(issues::get_board))
        .route("/api/issues", get(issues::list_issues).post(issues::create_issue))
        .route("/api/issues/search", get(issues::search_issues))
        .route("/api/issues/recent", get(issues::recent_issues))
        .route(
            "/api/issues/{id}",
            get(issues::get_issue)
                .patch(issues::update_issue)
                .delete(issues::delete_issue),
        )
        .route("/api/issues/{id}/move", post(issues::move_issue))
        .route("/api/issues/{id}/assignees", post(issues::add_assignee))
        .route("/api/issues/{id}/assignees/{user_id}", delete(issues::remove_assignee))
        .route(
            "/api/issues/{id}/comments",
            get(comments::list_comments).post(comments::create_comment),
        )
        .route(
            "/api/comments/{id}",
            patch(comments::update_comment).delete(comments::delete_comment),
        )
        .route("/api/ws", get(ws::handle_ws))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
