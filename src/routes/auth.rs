//! Auth routes — email/password sign-in, session management, WS tickets.

use axum::extract::{FromRef, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use time::Duration;
use tracing::{info, warn};

use crate::services::auth::{self as auth_svc, AuthError};
use crate::services::project::{self, ProjectError};
use crate::services::session;
use crate::state::AppState;

pub(crate) const COOKIE_NAME: &str = "session_token";

// =============================================================================
// AUTH EXTRACTOR
// =============================================================================

/// Authenticated user, from the session cookie or an `Authorization: Bearer`
/// header. Use as a handler parameter to require authentication.
pub struct AuthUser {
    pub user: session::SessionUser,
    pub token: String,
}

impl AuthUser {
    /// The project this user's requests are scoped to.
    ///
    /// # Errors
    ///
    /// `403` when the user has not been assigned a project.
    pub fn project_id(&self) -> Result<i64, StatusCode> {
        project::project_for_user(&self.user).map_err(project_error_to_status)
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub(crate) fn session_token(headers: &HeaderMap) -> Option<String> {
    let jar = CookieJar::from_headers(headers);
    if let Some(cookie) = jar.get(COOKIE_NAME).filter(|c| !c.value().is_empty()) {
        return Some(cookie.value().to_owned());
    }
    bearer_token(headers).map(str::to_owned)
}

impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    AppState: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut axum::http::request::Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = session_token(&parts.headers).ok_or(StatusCode::UNAUTHORIZED)?;

        let app_state = AppState::from_ref(state);
        let user = session::validate_session(&app_state.pool, &token)
            .await
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
            .ok_or(StatusCode::UNAUTHORIZED)?;

        Ok(Self { user, token })
    }
}

// =============================================================================
// ERROR MAPPING
// =============================================================================

pub(crate) fn auth_error_to_status(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidEmail | AuthError::WeakPassword => StatusCode::BAD_REQUEST,
        AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
        AuthError::Db(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub(crate) fn project_error_to_status(err: ProjectError) -> StatusCode {
    match err {
        ProjectError::NotFound(_) => StatusCode::NOT_FOUND,
        ProjectError::NoProject => StatusCode::FORBIDDEN,
        ProjectError::Validation(_) => StatusCode::BAD_REQUEST,
        ProjectError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn session_cookie(token: String, secure: bool, ttl_hours: i32) -> Cookie<'static> {
    Cookie::build((COOKIE_NAME, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(secure)
        .max_age(Duration::hours(i64::from(ttl_hours)))
        .build()
}

// =============================================================================
// HANDLERS
// =============================================================================

#[derive(Deserialize)]
pub struct LoginBody {
    email: String,
    password: String,
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub user: session::SessionUser,
    /// Also set as the `session_token` cookie; returned for bearer clients.
    pub token: String,
    pub created: bool,
}

/// `POST /api/auth/login` — sign in (or sign up), set the session cookie.
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<LoginBody>,
) -> Result<(CookieJar, Json<LoginResponse>), StatusCode> {
    let sign_in = auth_svc::sign_in_or_sign_up(&state.pool, &body.email, &body.password)
        .await
        .map_err(|e| {
            warn!(error = %e, "sign-in rejected");
            auth_error_to_status(&e)
        })?;

    let token = session::create_session(&state.pool, sign_in.user.id, state.config.session_ttl_hours)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    info!(user_id = %sign_in.user.id, created = sign_in.created, "session created");

    let cookie = session_cookie(token.clone(), state.config.cookie_secure, state.config.session_ttl_hours);
    let response = LoginResponse { user: sign_in.user, token, created: sign_in.created };
    Ok((jar.add(cookie), Json(response)))
}

/// `GET /api/auth/me` — the signed-in user.
pub async fn me(auth: AuthUser) -> Json<session::SessionUser> {
    Json(auth.user)
}

/// `POST /api/auth/logout` — delete session, clear cookie.
pub async fn logout(State(state): State<AppState>, auth: AuthUser) -> impl IntoResponse {
    let _ = session::delete_session(&state.pool, &auth.token).await;

    let cookie = Cookie::build((COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(state.config.cookie_secure)
        .max_age(Duration::ZERO);

    let jar = CookieJar::new().add(cookie);
    (jar, StatusCode::NO_CONTENT)
}

/// `POST /api/auth/ws-ticket` — create a one-time WS ticket.
pub async fn ws_ticket(State(state): State<AppState>, auth: AuthUser) -> Result<Json<serde_json::Value>, StatusCode> {
    let ticket = session::create_ws_ticket(&state.pool, auth.user.id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(Json(serde_json::json!({ "ticket": ticket })))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
