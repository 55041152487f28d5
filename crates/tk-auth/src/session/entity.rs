//! Session Entity
//!
//! Server-side session record backing the Session and Refresh strategies.
//! Only the digest of the session secret is stored; the raw secret travels
//! inside the signed token and is returned to the client exactly once.
//! Rotation re-signs the same session reference and never updates the row.

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::user::entity::User;
use crate::TsidGenerator;

/// Session entity
///
/// Stored in the database to enable:
/// 1. Validation of session-referencing tokens
/// 2. Revocation (logout, security events)
/// 3. Invalidating every session when the owner's password changes
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// TSID as primary key
    #[serde(rename = "_id")]
    pub id: String,

    /// Digest of the session secret. The raw secret is never persisted.
    pub key_hash: String,

    /// Owning user id
    pub user_id: String,

    /// The user's password digest at session-creation time. A session is
    /// valid only while this snapshot equals the user's current digest, so
    /// a password change logs the user out everywhere.
    pub password_hash: String,

    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,

    /// Cleanup horizon; matches the lifetime of the longest token that
    /// references this session.
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(
        key_hash: impl Into<String>,
        user_id: impl Into<String>,
        password_hash: impl Into<String>,
        ttl: Duration,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TsidGenerator::generate(),
            key_hash: key_hash.into(),
            user_id: user_id.into(),
            password_hash: password_hash.into(),
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Generate a cryptographically random session secret
    pub fn generate_raw_secret() -> String {
        use base64::Engine;
        use rand::Rng;

        let mut bytes = [0u8; 32];
        rand::thread_rng().fill(&mut bytes);
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Digest a raw secret for storage or comparison
    pub fn hash_secret(raw_secret: &str) -> String {
        use base64::Engine;
        use sha2::{Digest, Sha256};

        let mut hasher = Sha256::new();
        hasher.update(raw_secret.as_bytes());
        let hash = hasher.finalize();
        base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(hash)
    }

    /// Create a session for a user, snapshotting the current password
    /// digest. Returns the raw secret for the client and the entity for
    /// storage.
    pub fn generate_for_user(user: &User, ttl: Duration) -> (String, Self) {
        let raw_secret = Self::generate_raw_secret();
        let key_hash = Self::hash_secret(&raw_secret);
        let session = Self::new(key_hash, &user.id, &user.password_hash, ttl);
        (raw_secret, session)
    }

    /// Constant-time check of a presented raw secret against the stored
    /// digest.
    pub fn matches_secret(&self, raw_secret: &str) -> bool {
        let presented = Self::hash_secret(raw_secret);
        presented.as_bytes().ct_eq(self.key_hash.as_bytes()).into()
    }

    /// Constant-time check of the creation-time password snapshot against
    /// a current digest.
    pub fn matches_password_snapshot(&self, current_digest: &str) -> bool {
        self.password_hash
            .as_bytes()
            .ct_eq(current_digest.as_bytes())
            .into()
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::user::entity::User;

    #[test]
    fn test_generate_for_user() {
        let user = User::new("alice", "argon2-digest");
        let (raw, session) = Session::generate_for_user(&user, Duration::hours(730));

        assert!(!raw.is_empty());
        assert_eq!(session.user_id, user.id);
        assert_eq!(session.password_hash, "argon2-digest");
        assert_ne!(session.key_hash, raw);
        assert!(!session.is_expired());
    }

    #[test]
    fn test_secret_verification() {
        let user = User::new("bob", "digest");
        let (raw, session) = Session::generate_for_user(&user, Duration::hours(1));

        assert!(session.matches_secret(&raw));
        assert!(!session.matches_secret("not-the-secret"));
    }

    #[test]
    fn test_password_snapshot_comparison() {
        let user = User::new("carol", "old-digest");
        let (_, session) = Session::generate_for_user(&user, Duration::hours(1));

        assert!(session.matches_password_snapshot("old-digest"));
        // A changed password digest makes the snapshot stale.
        assert!(!session.matches_password_snapshot("new-digest"));
    }

    #[test]
    fn test_secret_digesting_is_stable() {
        let raw = Session::generate_raw_secret();
        assert_eq!(Session::hash_secret(&raw), Session::hash_secret(&raw));

        let other = Session::generate_raw_secret();
        assert_ne!(Session::hash_secret(&raw), Session::hash_secret(&other));
    }
}
