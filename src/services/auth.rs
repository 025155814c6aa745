//! Email + password credentials.
//!
//! Signing in with an unknown email registers it. New users join the oldest
//! project so a fresh install has a working board immediately.

use rand::Rng;
use sha2::{Digest, Sha256};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::frame::ErrorCode;
use crate::services::session::{SessionUser, bytes_to_hex};

const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email")]
    InvalidEmail,
    #[error("password must be at least 6 characters")]
    WeakPassword,
    #[error("incorrect email or password")]
    InvalidCredentials,
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidEmail => "E_INVALID_EMAIL",
            Self::WeakPassword => "E_WEAK_PASSWORD",
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::Db(_) => "E_DATABASE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Db(_))
    }
}

/// Outcome of a sign-in attempt.
#[derive(Debug, Clone)]
pub struct SignIn {
    pub user: SessionUser,
    /// The email was unknown and a user was registered for it.
    pub created: bool,
}

#[must_use]
pub fn normalize_email(email: &str) -> Option<String> {
    let normalized = email.trim().to_ascii_lowercase();
    let (local, domain) = normalized.split_once('@')?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return None;
    }
    Some(normalized)
}

/// # Errors
///
/// Returns `WeakPassword` when the password is shorter than the minimum.
pub fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    Ok(())
}

fn digest(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    bytes_to_hex(&hasher.finalize())
}

/// Hash with a fresh random salt. Stored as `salt$digest`.
#[must_use]
pub fn hash_password(password: &str) -> String {
    let salt_bytes: [u8; 16] = rand::rng().random();
    let salt = bytes_to_hex(&salt_bytes);
    let hash = digest(&salt, password);
    format!("{salt}${hash}")
}

#[must_use]
pub fn verify_password(stored: &str, password: &str) -> bool {
    let Some((salt, hash)) = stored.split_once('$') else {
        return false;
    };
    constant_time_eq(digest(salt, password).as_bytes(), hash.as_bytes())
}

/// Byte comparison whose running time does not depend on where the inputs
/// first differ.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == "23505")
}

fn name_from_email(email: &str) -> String {
    email
        .split('@')
        .next()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or("user")
        .to_owned()
}

fn avatar_for(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.as_bytes());
    format!("https://www.gravatar.com/avatar/{}?d=identicon", bytes_to_hex(&hasher.finalize()))
}

/// Sign in, registering the email if it is not known yet.
///
/// # Errors
///
/// Validation errors for malformed input, `InvalidCredentials` on a password
/// mismatch, and `Db` for query failures.
pub async fn sign_in_or_sign_up(pool: &PgPool, email: &str, password: &str) -> Result<SignIn, AuthError> {
    let email = normalize_email(email).ok_or(AuthError::InvalidEmail)?;
    validate_password(password)?;

    if let Some(user) = sign_in(pool, &email, password).await? {
        return Ok(SignIn { user, created: false });
    }

    match sign_up(pool, &email, password).await {
        Ok(user) => Ok(SignIn { user, created: true }),
        // A concurrent first sign-in registered the email first.
        Err(err) if is_unique_violation(&err) => {
            let user = sign_in(pool, &email, password)
                .await?
                .ok_or(AuthError::InvalidCredentials)?;
            Ok(SignIn { user, created: false })
        }
        Err(err) => Err(err.into()),
    }
}

/// Look up a registered user. `None` when the email is unknown.
async fn sign_in(pool: &PgPool, email: &str, password: &str) -> Result<Option<SessionUser>, AuthError> {
    let Some(row) = sqlx::query("SELECT id, name, email, avatar_url, project_id, password_hash FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?
    else {
        return Ok(None);
    };

    let stored: String = row.get("password_hash");
    if !verify_password(&stored, password) {
        return Err(AuthError::InvalidCredentials);
    }
    Ok(Some(SessionUser {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        avatar_url: row.get("avatar_url"),
        project_id: row.get("project_id"),
    }))
}

async fn sign_up(pool: &PgPool, email: &str, password: &str) -> Result<SessionUser, sqlx::Error> {
    let id = Uuid::new_v4();
    let name = name_from_email(email);
    let avatar_url = avatar_for(email);
    let row = sqlx::query(
        r"INSERT INTO users (id, name, email, avatar_url, password_hash, project_id)
          VALUES ($1, $2, $3, $4, $5, (SELECT id FROM projects ORDER BY id LIMIT 1))
          RETURNING project_id",
    )
    .bind(id)
    .bind(&name)
    .bind(email)
    .bind(&avatar_url)
    .bind(hash_password(password))
    .fetch_one(pool)
    .await?;

    tracing::info!(%id, %email, "registered user");
    Ok(SessionUser {
        id,
        name,
        email: email.to_owned(),
        avatar_url: Some(avatar_url),
        project_id: row.get("project_id"),
    })
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
