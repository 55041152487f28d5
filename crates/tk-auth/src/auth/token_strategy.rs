//! Token Strategy
//!
//! Fully stateless: one long-lived access token carrying the user claims
//! directly. Validation trusts the signed claims and never touches the
//! stores, so tokens stay valid until expiry regardless of later account
//! changes.

use std::sync::Arc;

use async_trait::async_trait;

use crate::auth::strategy::{AuthStrategy, Identity, IssuedTokens, Rotation};
use crate::auth::token_service::TokenService;
use crate::config::StrategyKind;
use crate::shared::error::{AuthError, Result};
use crate::user::entity::User;

pub struct TokenStrategy {
    tokens: Arc<TokenService>,
}

impl TokenStrategy {
    pub fn new(tokens: Arc<TokenService>) -> Self {
        Self { tokens }
    }
}

#[async_trait]
impl AuthStrategy for TokenStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Token
    }

    async fn issue(&self, user: &User) -> Result<IssuedTokens> {
        let ttl = self.tokens.lifetimes().long();
        let access_token = self.tokens.issue_user_token(user, ttl)?;

        Ok(IssuedTokens {
            access_token,
            refresh_token: None,
        })
    }

    async fn validate(&self, token: &str) -> Result<Identity> {
        let claims = self.tokens.verify(token)?;
        let user = claims
            .user
            .ok_or_else(|| AuthError::unauthorized("Invalid token"))?;

        Ok(Identity {
            user,
            session: None,
            rotation: Rotation::default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenLifetimes;

    fn strategy() -> TokenStrategy {
        TokenStrategy::new(Arc::new(TokenService::new(
            "test-key",
            TokenLifetimes::default(),
        )))
    }

    #[tokio::test]
    async fn test_issue_then_validate() {
        let strategy = strategy();
        let user = User::new("alice", "digest");

        let issued = strategy.issue(&user).await.unwrap();
        assert!(issued.refresh_token.is_none());

        let identity = strategy.validate(&issued.access_token).await.unwrap();
        assert_eq!(identity.user.id, user.id);
        assert_eq!(identity.user.username, "alice");
        assert!(identity.session.is_none());
        assert!(identity.rotation.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_foreign_signature() {
        let strategy = strategy();
        let other = TokenStrategy::new(Arc::new(TokenService::new(
            "other-key",
            TokenLifetimes::default(),
        )));

        let user = User::new("bob", "digest");
        let issued = other.issue(&user).await.unwrap();

        assert!(strategy.validate(&issued.access_token).await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_session_shaped_token() {
        // A token without user claims cannot authenticate under this
        // strategy even when its signature is ours.
        let tokens = Arc::new(TokenService::new("test-key", TokenLifetimes::default()));
        let strategy = TokenStrategy::new(tokens.clone());

        let user = User::new("carol", "digest");
        let (raw, session) =
            crate::session::entity::Session::generate_for_user(&user, chrono::Duration::hours(1));
        let token = tokens
            .issue_session_token(&session, &raw, chrono::Duration::hours(1))
            .unwrap();

        assert!(strategy.validate(&token).await.is_err());
    }
}
