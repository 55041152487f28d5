//! Refresh Strategy
//!
//! Short-lived access tokens carrying user claims, paired with a
//! long-lived refresh token referencing a server-side session. An access
//! token authenticates directly while fresh. Once it expires the client
//! retries with its refresh token, whose session path mints a fresh pair
//! in the response headers (rotating refresh).
//!
//! Two concurrent rotations from the same refresh token both succeed and
//! both stay valid: rotation re-signs the session reference without
//! writing the session row, which holds no rotation counter. Last writer
//! wins on the client side. This is a documented limit of the scheme.

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::strategy::{
    validate_session_reference, AuthStrategy, Identity, IssuedTokens, Rotation,
};
use crate::auth::token_service::{TokenService, TokenUser};
use crate::config::StrategyKind;
use crate::session::entity::Session;
use crate::session::repository::SessionRepository;
use crate::shared::error::{AuthError, Result};
use crate::user::entity::User;
use crate::user::repository::UserRepository;

pub struct RefreshStrategy {
    tokens: Arc<TokenService>,
    sessions: Arc<SessionRepository>,
    users: Arc<UserRepository>,
}

impl RefreshStrategy {
    pub fn new(
        tokens: Arc<TokenService>,
        sessions: Arc<SessionRepository>,
        users: Arc<UserRepository>,
    ) -> Self {
        Self {
            tokens,
            sessions,
            users,
        }
    }
}

#[async_trait]
impl AuthStrategy for RefreshStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Refresh
    }

    async fn issue(&self, user: &User) -> Result<IssuedTokens> {
        let lifetimes = self.tokens.lifetimes();

        let (raw_secret, session) = Session::generate_for_user(user, lifetimes.long());
        self.sessions.insert(&session).await?;

        let access_token = self.tokens.issue_user_token(user, lifetimes.short())?;
        let refresh_token =
            self.tokens
                .issue_session_token(&session, &raw_secret, lifetimes.long())?;

        Ok(IssuedTokens {
            access_token,
            refresh_token: Some(refresh_token),
        })
    }

    async fn validate(&self, token: &str) -> Result<Identity> {
        // Check the signature first, expiry second: an expired token must
        // still tell us which kind it was so the client learns whether to
        // refresh or to log in again.
        let claims = self.tokens.verify_ignoring_expiry(token)?;

        let Some(reference) = claims.session_reference() else {
            if claims.is_expired() {
                return Err(AuthError::unauthorized("Expired Access Token"));
            }
            let user = claims
                .user
                .ok_or_else(|| AuthError::unauthorized("Invalid token"))?;

            return Ok(Identity {
                user,
                session: None,
                rotation: Rotation::default(),
            });
        };

        if claims.is_expired() {
            return Err(AuthError::unauthorized("Expired Refresh Token"));
        }

        let (user, session) =
            validate_session_reference(&self.sessions, &self.users, &reference).await?;

        let lifetimes = self.tokens.lifetimes();
        let access_token = self.tokens.issue_user_token(&user, lifetimes.short())?;
        let refresh_token =
            self.tokens
                .issue_session_token(&session, &reference.session_key, lifetimes.long())?;

        Ok(Identity {
            user: TokenUser::from(&user),
            session: Some(session),
            rotation: Rotation {
                access_token: Some(access_token),
                refresh_token: Some(refresh_token),
            },
        })
    }
}
