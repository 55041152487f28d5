//! Abuse Detector
//!
//! Sliding-window lockout over the attempt ledger. Runs before any
//! credential check so attackers learn nothing about a locked account,
//! and counts only failures, so legitimate users are never locked out
//! by their own successful logins.

use std::sync::Arc;

use chrono::Utc;
use tracing::warn;

use crate::attempt::entity::AuthAttempt;
use crate::attempt::repository::AttemptRepository;
use crate::config::AbusePolicy;
use crate::shared::error::{AuthError, Result};

pub struct AbuseDetector {
    attempts: Arc<AttemptRepository>,
    policy: AbusePolicy,
}

impl AbuseDetector {
    pub fn new(attempts: Arc<AttemptRepository>, policy: AbusePolicy) -> Self {
        Self { attempts, policy }
    }

    /// Fail with `RateLimited` when either the per-IP or the
    /// per-(IP, username) count inside the window has reached its
    /// threshold.
    pub async fn check(&self, ip: &str, username: &str) -> Result<()> {
        let since = self.policy.window_start(Utc::now());

        let ip_count = self.attempts.count_for_ip_since(ip, since).await?;
        let pair_count = self
            .attempts
            .count_for_ip_and_username_since(ip, username, since)
            .await?;

        if self.policy.is_blocked(ip_count, pair_count) {
            warn!(ip, username, ip_count, pair_count, "login locked out");
            return Err(AuthError::RateLimited);
        }

        Ok(())
    }

    /// Record exactly one failed credential check.
    pub async fn record_failure(&self, ip: &str, username: &str) -> Result<()> {
        self.attempts.insert(&AuthAttempt::new(ip, username)).await
    }
}
