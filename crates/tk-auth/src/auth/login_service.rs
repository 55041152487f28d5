//! Login Pipeline
//!
//! The ordered credential login sequence. Stages run strictly in order
//! and the first failing stage ends the attempt with its own error kind:
//!
//! 1. abuse check
//! 2. credential check (fetch by identifier, verify digest)
//! 3. ledger entry on credential failure
//! 4. disabled account check
//! 5. deleted account check
//! 6. strategy issuance
//!
//! The abuse check runs before the credential check so a locked-out
//! caller learns nothing about the credentials it is probing, and the
//! credential failure response never says whether the identifier or the
//! password was wrong.

use std::sync::Arc;

use tracing::{debug, info};

use crate::attempt::detector::AbuseDetector;
use crate::auth::password_service::PasswordService;
use crate::auth::strategy::{AuthStrategy, IssuedTokens};
use crate::shared::error::{AuthError, Result};
use crate::user::entity::User;
use crate::user::repository::UserRepository;

pub struct LoginService {
    users: Arc<UserRepository>,
    passwords: Arc<PasswordService>,
    detector: Arc<AbuseDetector>,
    strategy: Arc<dyn AuthStrategy>,
}

impl LoginService {
    pub fn new(
        users: Arc<UserRepository>,
        passwords: Arc<PasswordService>,
        detector: Arc<AbuseDetector>,
        strategy: Arc<dyn AuthStrategy>,
    ) -> Self {
        Self {
            users,
            passwords,
            detector,
            strategy,
        }
    }

    pub fn strategy(&self) -> &Arc<dyn AuthStrategy> {
        &self.strategy
    }

    /// Run the full login pipeline for one credential attempt.
    pub async fn login(
        &self,
        ip: &str,
        username: &str,
        password: &str,
    ) -> Result<(User, IssuedTokens)> {
        // 1. Lockout check, before anything touches the credentials.
        self.detector.check(ip, username).await?;

        // 2. Fetch and verify. Unknown identifier and wrong password are
        //    indistinguishable from here on.
        let user = self.verify_credentials(username, password).await?;

        // 3. Exactly one ledger entry per failed attempt.
        let Some(user) = user else {
            self.detector.record_failure(ip, username).await?;
            debug!(username, "credential check failed");
            return Err(AuthError::InvalidCredentials);
        };

        // 4. Disabled accounts never receive tokens.
        if !user.enabled {
            return Err(AuthError::AccountDisabled);
        }

        // 5. Neither do soft-deleted ones.
        if user.deleted {
            return Err(AuthError::AccountDeleted);
        }

        // 6. Hand the verified user to the active strategy.
        let tokens = self.strategy.issue(&user).await?;

        info!(username = %user.username, strategy = %self.strategy.kind(), "login succeeded");
        Ok((user, tokens))
    }

    async fn verify_credentials(&self, username: &str, password: &str) -> Result<Option<User>> {
        let Some(user) = self.users.find_by_username(username).await? else {
            return Ok(None);
        };

        if self.passwords.verify_password(password, &user.password_hash)? {
            Ok(Some(user))
        } else {
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    // The pipeline needs the user store and attempt ledger; ordering and
    // error mapping are covered by the integration tests, which require a
    // MongoDB connection.
}
