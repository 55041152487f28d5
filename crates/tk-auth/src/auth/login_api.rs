//! Login API Endpoints
//!
//! - POST /login - Credential login
//! - POST /logout - Revoke the current session
//!
//! Which tokens the login response carries depends on the strategy the
//! server was started with: Token and Session return an access token,
//! Refresh additionally returns a refresh token.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::auth::login_service::LoginService;
use crate::session::repository::SessionRepository;
use crate::shared::error::Result;
use crate::shared::middleware::{Authenticated, ClientIp};
use crate::user::api::UserResponse;

/// Login request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    /// Login identifier
    pub username: String,

    /// Password
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// The authenticated user, credential digests scrubbed
    pub user: UserResponse,

    /// Access token for subsequent requests
    pub access_token: String,

    /// Refresh token; present under the Refresh strategy only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

/// Login service state
#[derive(Clone)]
pub struct LoginApiState {
    pub login_service: Arc<LoginService>,
    pub sessions: Arc<SessionRepository>,
}

/// Login with username and password
#[utoipa::path(
    post,
    path = "/login",
    tag = "login",
    operation_id = "postLogin",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 400, description = "Account is deleted"),
        (status = 401, description = "Invalid credentials or account disabled"),
        (status = 429, description = "Too many attempts")
    )
)]
pub async fn login(
    State(state): State<LoginApiState>,
    ClientIp(ip): ClientIp,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (user, tokens) = state
        .login_service
        .login(&ip, &req.username, &req.password)
        .await?;

    Ok(Json(LoginResponse {
        user: user.into(),
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
    }))
}

/// Logout / revoke the current session
///
/// Under the Session and Refresh strategies the backing session row is
/// deleted, so every token referencing it stops validating. The Token
/// strategy has nothing to revoke server-side; the client drops its
/// token.
#[utoipa::path(
    post,
    path = "/logout",
    tag = "login",
    operation_id = "postLogout",
    responses(
        (status = 204, description = "Logout successful"),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = []))
)]
pub async fn logout(
    State(state): State<LoginApiState>,
    auth: Authenticated,
) -> Result<StatusCode> {
    if let Some(session) = &auth.session {
        state.sessions.delete(&session.id).await?;
        info!(username = %auth.user.username, "session revoked");
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Create the login router
pub fn login_router(state: LoginApiState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(login))
        .routes(routes!(logout))
        .with_state(state)
}
