//! Auth Strategy Engine
//!
//! One of three interchangeable strategies is selected at startup and
//! injected wherever authentication happens. Each strategy mints tokens
//! for a verified user and turns an inbound bearer token back into an
//! identity. Strategies that reference server-side sessions share one
//! validation path so the secret and password-snapshot checks exist in
//! exactly one place.

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::token_service::{SessionReference, TokenService, TokenUser};
use crate::config::StrategyKind;
use crate::session::entity::Session;
use crate::session::repository::SessionRepository;
use crate::shared::error::{AuthError, Result};
use crate::user::entity::User;
use crate::user::repository::UserRepository;

/// Tokens minted by a successful issuance
#[derive(Debug, Clone)]
pub struct IssuedTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Fresh tokens to append to the response as headers. Rotated tokens
/// never travel in a response body.
#[derive(Debug, Clone, Default)]
pub struct Rotation {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

impl Rotation {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none()
    }
}

/// The authenticated caller, as established by `validate`
#[derive(Debug, Clone)]
pub struct Identity {
    pub user: TokenUser,
    pub session: Option<Session>,
    pub rotation: Rotation,
}

/// A single authentication strategy
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    /// Mint tokens for a user whose credentials and account state have
    /// already been verified.
    async fn issue(&self, user: &User) -> Result<IssuedTokens>;

    /// Validate an inbound bearer token into an identity. May carry
    /// rotated tokens for the response headers.
    async fn validate(&self, token: &str) -> Result<Identity>;
}

/// Build the strategy selected by configuration. Called once at startup;
/// the result is injected as `Arc<dyn AuthStrategy>`.
pub fn create_strategy(
    kind: StrategyKind,
    tokens: Arc<TokenService>,
    sessions: Arc<SessionRepository>,
    users: Arc<UserRepository>,
) -> Arc<dyn AuthStrategy> {
    use crate::auth::refresh_strategy::RefreshStrategy;
    use crate::auth::session_strategy::SessionStrategy;
    use crate::auth::token_strategy::TokenStrategy;

    match kind {
        StrategyKind::Token => Arc::new(TokenStrategy::new(tokens)),
        StrategyKind::Session => Arc::new(SessionStrategy::new(tokens, sessions, users)),
        StrategyKind::Refresh => Arc::new(RefreshStrategy::new(tokens, sessions, users)),
    }
}

/// Validate a session reference from a signed token against the stores.
///
/// Checks, in order: the session exists, the presented secret digests to
/// the stored digest, the owning user exists and may still authenticate,
/// and the session's password snapshot equals the user's current digest.
/// Secret and snapshot comparisons are constant time. Every failure mode
/// reports the same message so callers cannot probe which check failed.
pub(crate) async fn validate_session_reference(
    sessions: &SessionRepository,
    users: &UserRepository,
    reference: &SessionReference,
) -> Result<(User, Session)> {
    let session = sessions
        .find_by_id(&reference.session_id)
        .await?
        .ok_or_else(invalid_session)?;

    if !session.matches_secret(&reference.session_key) {
        return Err(invalid_session());
    }

    let user = users
        .find_by_id(&session.user_id)
        .await?
        .ok_or_else(invalid_session)?;

    if !user.can_authenticate() {
        return Err(invalid_session());
    }

    // A password change makes the snapshot stale and logs the user out
    // everywhere.
    if !session.matches_password_snapshot(&user.password_hash) {
        return Err(invalid_session());
    }

    Ok((user, session))
}

fn invalid_session() -> AuthError {
    AuthError::unauthorized("Invalid Session")
}
