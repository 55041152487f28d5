//! Session Strategy
//!
//! One long-lived access token referencing a server-side session. Every
//! successful validation re-signs the same session reference with a fresh
//! expiry and hands it back in a response header, so an active client
//! never has to log in again while its session stays valid.

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

pub struct SessionStrategy {
    tokens: Arc<TokenService>,
    sessions: Arc<SessionRepository>,
    users: Arc<UserRepository>,
}

impl SessionStrategy {
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
impl AuthStrategy for SessionStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Session
    }

    async fn issue(&self, user: &User) -> Result<IssuedTokens> {
        let ttl = self.tokens.lifetimes().long();
        let (raw_secret, session) = Session::generate_for_user(user, ttl);
        self.sessions.insert(&session).await?;

        let access_token = self.tokens.issue_session_token(&session, &raw_secret, ttl)?;

        Ok(IssuedTokens {
            access_token,
            refresh_token: None,
        })
    }

    async fn validate(&self, token: &str) -> Result<Identity> {
        let claims = self.tokens.verify(token)?;
        let reference = claims
            .session_reference()
            .ok_or_else(|| AuthError::unauthorized("Invalid token"))?;

        let (user, session) =
            validate_session_reference(&self.sessions, &self.users, &reference).await?;

        // Sliding renewal: same session, fresh expiry.
        let ttl = self.tokens.lifetimes().long();
        let renewed = self
            .tokens
            .issue_session_token(&session, &reference.session_key, ttl)?;

        Ok(Identity {
            user: TokenUser::from(&user),
            session: Some(session),
            rotation: Rotation {
                access_token: Some(renewed),
                refresh_token: None,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    // Session validation touches the user and session stores; covered by
    // the integration tests, which require a MongoDB connection.
}
