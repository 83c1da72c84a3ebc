//! Session extraction and account handlers
//!
//! Sessions are JWTs carried in an HTTP-only cookie. The [`CurrentUser`]
//! extractor rejects any request without a valid token before the handler
//! body runs, so KPI handlers never see an unauthenticated request.

use crate::{AppState, WebError};
use axum::extract::{FromRequestParts, State};
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::response::{AppendHeaders, IntoResponse, Json};
use axum_extra::extract::cookie::CookieJar;
use pp_auth::Claims;
use pp_store::{NewUser, Role, UserSummary};
use serde::Deserialize;
use std::sync::Arc;
use tracing::info;

/// Minimum accepted password length at registration
const MIN_PASSWORD_LEN: usize = 8;

/// The authenticated caller's verified claims
#[derive(Debug, Clone)]
pub struct CurrentUser(pub Claims);

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = WebError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(&state.cookie_name)
            .map(|cookie| cookie.value().to_string())
            .ok_or_else(|| WebError::Unauthorized("Not authenticated".to_string()))?;

        let claims = state
            .auth
            .verify_token(&token)
            .map_err(|_| WebError::Unauthorized("Invalid or expired session".to_string()))?;

        Ok(CurrentUser(claims))
    }
}

fn session_cookie(state: &AppState, token: &str, max_age_secs: u64) -> String {
    let mut cookie = format!(
        "{}={token}; HttpOnly; Path=/; Max-Age={max_age_secs}; SameSite=Lax",
        state.cookie_name
    );
    if state.cookie_secure {
        cookie.push_str("; Secure");
    }
    cookie
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub personnel_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/auth/register
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, WebError> {
    if request.name.trim().is_empty() {
        return Err(WebError::BadRequest("Name is required".to_string()));
    }
    if !request.email.contains('@') {
        return Err(WebError::BadRequest("A valid email is required".to_string()));
    }
    if request.password.len() < MIN_PASSWORD_LEN {
        return Err(WebError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    let personnel_id = request
        .personnel_id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| WebError::BadRequest("Personnel ID is required".to_string()))?;
    if state.store.get_personnel(personnel_id)?.is_none() {
        return Err(WebError::BadRequest(
            "Invalid personnel ID: no matching personnel record".to_string(),
        ));
    }

    let password_hash = pp_auth::hash_password(&request.password)
        .map_err(|e| WebError::ServerError(e.to_string()))?;

    // Self-registration never grants an elevated role; those come from the
    // account-creation command.
    let user = state.store.create_user(&NewUser {
        name: request.name.trim().to_string(),
        email: request.email.trim().to_string(),
        password_hash,
        role: Role::User,
        personnel_id: Some(personnel_id.to_string()),
    })?;

    info!(user_id = user.user_id, "Account registered");

    Ok((
        http::StatusCode::CREATED,
        Json(UserSummary {
            user_id: user.user_id,
            name: user.name,
            email: user.email,
            role: user.role,
            personnel_id: user.personnel_id,
        }),
    ))
}

/// POST /api/auth/login
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, WebError> {
    let invalid = || WebError::Unauthorized("Invalid email or password".to_string());

    let user = state
        .store
        .user_by_email(&request.email)?
        .ok_or_else(invalid)?;

    let matches = pp_auth::verify_password(&request.password, &user.password_hash)
        .map_err(|e| WebError::ServerError(e.to_string()))?;
    if !matches {
        return Err(invalid());
    }

    let token = state
        .auth
        .sign_token(user.user_id, &user.email, &user.name, user.role.as_str())
        .map_err(|e| WebError::ServerError(e.to_string()))?;

    info!(user_id = user.user_id, "Login");

    let cookie = session_cookie(&state, &token, state.auth.token_ttl_secs());
    Ok((
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(serde_json::json!({
            "userId": user.user_id,
            "name": user.name,
            "email": user.email,
            "role": user.role.as_str(),
        })),
    ))
}

/// POST /api/auth/logout — clears the session cookie
pub async fn logout_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cookie = session_cookie(&state, "", 0);
    (
        AppendHeaders([(SET_COOKIE, cookie)]),
        Json(serde_json::json!({ "message": "Logged out" })),
    )
}

/// GET /api/auth/me — echoes the verified claims
pub async fn me_handler(user: CurrentUser) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "userId": user.0.user_id,
        "email": user.0.email,
        "name": user.0.name,
        "role": user.0.role,
    }))
}
