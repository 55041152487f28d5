//! Social Login Service
//!
//! Bridges an external provider callback into the system's own token
//! issuance. The callback leg exchanges the code, fetches the profile,
//! finds or creates the matching user and hands the browser a one-minute
//! exchange token. The redemption leg verifies that token plus its
//! correlation key and then issues normal strategy tokens, so a social
//! login ends exactly where a password login does.

use std::sync::Arc;

use subtle::ConstantTimeEq;
use tracing::info;

use crate::auth::password_service::PasswordService;
use crate::auth::strategy::{AuthStrategy, IssuedTokens};
use crate::auth::token_service::{ExchangeClaims, StateClaims, TokenService};
use crate::config::ProviderSettings;
use crate::session::entity::Session;
use crate::shared::error::{AuthError, Result};
use crate::social::provider::{SocialProfile, SocialProvider};
use crate::social::provider_client::ProviderClient;
use crate::user::entity::{User, UserRole};
use crate::user::repository::UserRepository;

pub struct SocialLoginService {
    users: Arc<UserRepository>,
    passwords: Arc<PasswordService>,
    tokens: Arc<TokenService>,
    strategy: Arc<dyn AuthStrategy>,
    client: ProviderClient,
}

impl SocialLoginService {
    pub fn new(
        users: Arc<UserRepository>,
        passwords: Arc<PasswordService>,
        tokens: Arc<TokenService>,
        strategy: Arc<dyn AuthStrategy>,
    ) -> Self {
        Self {
            users,
            passwords,
            tokens,
            strategy,
            client: ProviderClient::new(),
        }
    }

    /// Build the provider consent-page URL for the outbound leg. The
    /// state parameter is a signed short-lived token, verified on the way
    /// back, so no per-request state is stored server-side.
    pub fn authorize_redirect(
        &self,
        provider: SocialProvider,
        settings: &ProviderSettings,
        callback_url: &str,
    ) -> Result<String> {
        let nonce = Session::generate_raw_secret();
        let state = self
            .tokens
            .issue_state_token(&StateClaims::new(provider, nonce))?;
        Ok(self
            .client
            .build_authorize_url(provider, settings, callback_url, &state))
    }

    /// Check the state parameter echoed by the provider callback.
    pub fn verify_state(&self, provider: SocialProvider, state: &str) -> Result<()> {
        let claims = self
            .tokens
            .verify_state(state)
            .map_err(|_| AuthError::unauthorized("Invalid state parameter"))?;
        if claims.provider != provider {
            return Err(AuthError::unauthorized("Invalid state parameter"));
        }
        Ok(())
    }

    /// Run the full inbound callback leg: exchange the code, fetch and
    /// parse the profile, then bridge it into an exchange token.
    pub async fn handle_callback(
        &self,
        provider: SocialProvider,
        settings: &ProviderSettings,
        code: &str,
        callback_url: &str,
    ) -> Result<String> {
        let provider_token = self
            .client
            .exchange_code(provider, settings, provider.token_url(), code, callback_url)
            .await?;
        let payload = self
            .client
            .fetch_profile(provider, provider.profile_url(), &provider_token)
            .await?;
        let profile = provider.parse_profile(&payload)?;
        self.bridge_profile(provider, profile).await
    }

    /// Turn a verified external profile into a one-minute exchange token.
    ///
    /// Persists the digest of a fresh single-use correlation key on the
    /// user; the raw key travels only inside the signed token.
    pub async fn bridge_profile(
        &self,
        provider: SocialProvider,
        profile: SocialProfile,
    ) -> Result<String> {
        let (mut user, created) = self.find_or_create(provider, &profile).await?;

        let key = Session::generate_raw_secret();
        user.social_login_hash = Some(Session::hash_secret(&key));

        if created {
            self.users.insert(&user).await?;
            info!(username = %user.username, %provider, "created user from social profile");
        } else {
            self.users.update(&user).await?;
        }

        self.tokens
            .issue_exchange_token(&ExchangeClaims::new(&user, &key))
    }

    /// Redeem an exchange token for normal strategy tokens.
    ///
    /// The correlation digest is cleared with a conditional update, so of
    /// two racing redemptions of the same token exactly one succeeds.
    /// Every failure mode reports the same message.
    pub async fn redeem(&self, exchange_token: &str) -> Result<(User, IssuedTokens)> {
        let claims = self
            .tokens
            .verify_exchange(exchange_token)
            .map_err(|_| invalid_key())?;

        let (field, value) = claims.lookup();
        let mut user = self
            .users
            .find_for_redemption(field, value)
            .await?
            .ok_or_else(invalid_key)?;

        if !user.enabled {
            return Err(AuthError::AccountDisabled);
        }
        if user.deleted {
            return Err(AuthError::AccountDeleted);
        }

        let stored = user.social_login_hash.as_deref().ok_or_else(invalid_key)?;
        let presented = Session::hash_secret(&claims.key);
        let matches: bool = presented.as_bytes().ct_eq(stored.as_bytes()).into();
        if !matches {
            return Err(invalid_key());
        }

        if !self.users.claim_social_login_hash(&user.id, stored).await? {
            return Err(invalid_key());
        }
        user.social_login_hash = None;

        let tokens = self.strategy.issue(&user).await?;
        info!(username = %user.username, "social login redeemed");
        Ok((user, tokens))
    }

    /// Look the user up by username and by the provider's external id
    /// concurrently. A username match wins a tie so account linkage stays
    /// deterministic. Returns whether the user still needs inserting.
    async fn find_or_create(
        &self,
        provider: SocialProvider,
        profile: &SocialProfile,
    ) -> Result<(User, bool)> {
        let (by_username, by_provider_id) = tokio::join!(
            self.users.find_by_username(&profile.username),
            self.users.find_by_provider_id(provider, &profile.provider_id),
        );

        if let Some(mut user) = by_username?.or(by_provider_id?) {
            // Reconcile the external id onto the existing account.
            user.set_provider_id(provider, &profile.provider_id);
            return Ok((user, false));
        }

        // First visit from this identity. The account gets a random
        // placeholder password; setting a real one is a separate step.
        let placeholder = uuid::Uuid::new_v4().to_string();
        let password_hash = self.passwords.hash_generated(&placeholder)?;

        let mut user = User::new(&profile.username, password_hash)
            .with_role(UserRole::Restricted)
            .with_provider_id(provider, &profile.provider_id);
        user.email = profile.email.clone();
        user.avatar = profile.avatar.clone();
        user.introduction = profile.introduction.clone();

        Ok((user, true))
    }
}

fn invalid_key() -> AuthError {
    AuthError::unauthorized("Invalid username or key.")
}

#[cfg(test)]
mod tests {
    // Bridge and redemption flows run against live collections;
    // see tests/store_flow_tests.rs
}
