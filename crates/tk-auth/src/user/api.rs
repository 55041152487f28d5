//! User API Endpoints
//!
//! - POST /register - Register a new account
//! - GET /user/me - Current user info
//! - PUT /user/me/password - Change own password

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use utoipa::ToSchema;
use utoipa_axum::{router::OpenApiRouter, routes};

use crate::auth::password_service::PasswordService;
use crate::session::repository::SessionRepository;
use crate::shared::error::{AuthError, Result};
use crate::shared::middleware::Authenticated;
use crate::user::entity::User;
use crate::user::repository::UserRepository;

/// Registration request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    /// Login identifier
    pub username: String,

    /// Password
    pub password: String,

    /// Email address
    pub email: Option<String>,
}

/// Change own password request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    /// Current password, verified before the change
    pub current_password: String,

    /// New password
    pub new_password: String,
}

/// Status message response
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub message: String,
}

/// User response DTO. Credential and correlation digests never leave the
/// entity; this is the only user shape responses carry.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub introduction: Option<String>,
    pub role: String,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitbucket_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weixin_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            username: u.username,
            email: u.email,
            mobile: u.mobile,
            avatar: u.avatar,
            introduction: u.introduction,
            role: u.role.as_str().to_string(),
            enabled: u.enabled,
            github_id: u.github_id,
            google_id: u.google_id,
            bitbucket_id: u.bitbucket_id,
            weixin_id: u.weixin_id,
            created_at: u.created_at.to_rfc3339(),
            updated_at: u.updated_at.to_rfc3339(),
        }
    }
}

/// User service state
#[derive(Clone)]
pub struct UsersState {
    pub users: Arc<UserRepository>,
    pub passwords: Arc<PasswordService>,
    pub sessions: Arc<SessionRepository>,
}

/// Register a new account
#[utoipa::path(
    post,
    path = "/register",
    tag = "user",
    operation_id = "postRegister",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 400, description = "Validation error"),
        (status = 409, description = "Duplicate username")
    )
)]
pub async fn register(
    State(state): State<UsersState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    // Check for duplicate username
    if state.users.find_by_username(&req.username).await?.is_some() {
        return Err(AuthError::duplicate("User", "username", &req.username));
    }

    let password_hash = state.passwords.hash_password(&req.password)?;

    let mut user = User::new(&req.username, password_hash);
    user.email = req.email.clone();

    state.users.insert(&user).await?;

    info!(username = %user.username, "registered user");

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// Get current user info
#[utoipa::path(
    get,
    path = "/user/me",
    tag = "user",
    operation_id = "getUserMe",
    responses(
        (status = 200, description = "Current user info", body = UserResponse),
        (status = 401, description = "Not authenticated")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_current_user(
    State(state): State<UsersState>,
    auth: Authenticated,
) -> Result<Json<UserResponse>> {
    let user = state
        .users
        .find_by_id(&auth.user.id)
        .await?
        .ok_or_else(|| AuthError::unauthorized("Unknown user"))?;

    Ok(Json(user.into()))
}

/// Change own password
///
/// Verifies the current password first. Every session the user holds is
/// revoked, so all devices have to log in again with the new password.
#[utoipa::path(
    put,
    path = "/user/me/password",
    tag = "user",
    operation_id = "putUserMePassword",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Wrong current password")
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<UsersState>,
    auth: Authenticated,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>> {
    let user = state
        .users
        .find_by_id(&auth.user.id)
        .await?
        .ok_or_else(|| AuthError::unauthorized("Unknown user"))?;

    if !state
        .passwords
        .verify_password(&req.current_password, &user.password_hash)?
    {
        return Err(AuthError::unauthorized("Current password is incorrect"));
    }

    let new_hash = state.passwords.hash_password(&req.new_password)?;
    state.users.set_password(&user.id, &new_hash).await?;

    // Outstanding sessions snapshot the old digest and would fail
    // validation anyway; dropping the rows keeps the store tidy.
    let revoked = state.sessions.delete_for_user(&user.id).await?;

    info!(username = %user.username, revoked, "password changed");

    Ok(Json(MessageResponse {
        message: "Password updated. Please log in again.".to_string(),
    }))
}

/// Create the user router
pub fn user_router(state: UsersState) -> OpenApiRouter {
    OpenApiRouter::new()
        .routes(routes!(register))
        .routes(routes!(get_current_user))
        .routes(routes!(change_password))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_deserialization() {
        let json = r#"{"username":"Alice","password":"correct horse battery","email":"alice@example.com"}"#;
        let req: RegisterRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.username, "Alice");
        assert_eq!(req.email.as_deref(), Some("alice@example.com"));
    }

    #[test]
    fn test_change_password_request_uses_camel_case() {
        let json = r#"{"currentPassword":"old","newPassword":"new"}"#;
        let req: ChangePasswordRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.current_password, "old");
        assert_eq!(req.new_password, "new");
    }

    #[test]
    fn test_user_response_scrubs_digests() {
        let mut user = User::new("bob", "argon2-digest").with_email("bob@example.com");
        user.social_login_hash = Some("correlation-digest".to_string());

        let response = UserResponse::from(user);
        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains("\"username\":\"bob\""));
        assert!(!json.contains("passwordHash"));
        assert!(!json.contains("argon2-digest"));
        assert!(!json.contains("socialLoginHash"));
        assert!(!json.contains("correlation-digest"));
    }

    #[test]
    fn test_user_response_field_names() {
        let response = UserResponse::from(User::new("carol", "digest"));
        let json = serde_json::to_string(&response).unwrap();

        assert!(json.contains("\"role\":\"MEMBER\""));
        assert!(json.contains("\"enabled\":true"));
        assert!(json.contains("createdAt"));
    }
}
