//! User Entity
//!
//! Account record backing every authentication strategy. Credential and
//! social-correlation digests live here but are stripped from every API
//! response (see `UserResponse` in the api module).

use bson::serde_helpers::chrono_datetime_as_bson_datetime;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::social::provider::SocialProvider;

/// Access role attached to a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    /// Full administrative access
    Administrator,
    /// Regular registered user
    Member,
    /// Limited access, assigned to accounts auto-created by social login
    Restricted,
}

impl Default for UserRole {
    fn default() -> Self {
        Self::Member
    }
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Administrator => "ADMINISTRATOR",
            UserRole::Member => "MEMBER",
            UserRole::Restricted => "RESTRICTED",
        }
    }
}

/// User entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    /// TSID as Crockford Base32 string
    #[serde(rename = "_id")]
    pub id: String,

    /// Login identifier, stored lowercase
    pub username: String,

    /// Argon2 digest of the password. Never serialized to clients.
    pub password_hash: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mobile: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub introduction: Option<String>,

    #[serde(default)]
    pub role: UserRole,

    /// Disabled accounts fail login even with correct credentials
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Soft-delete flag; deleted accounts are kept for audit
    #[serde(default)]
    pub deleted: bool,

    /// External identity ids, one per social provider
    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitbucket_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weixin_id: Option<String>,

    /// Digest of the single-use social-login correlation key.
    /// Present only while a social login is in flight.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub social_login_hash: Option<String>,

    /// Audit fields
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

fn default_enabled() -> bool {
    true
}

impl User {
    /// Create a new user. The username is lowercased so lookups stay
    /// case-insensitive.
    pub fn new(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: crate::TsidGenerator::generate(),
            username: username.into().to_lowercase(),
            password_hash: password_hash.into(),
            email: None,
            mobile: None,
            avatar: None,
            introduction: None,
            role: UserRole::default(),
            enabled: true,
            deleted: false,
            github_id: None,
            google_id: None,
            bitbucket_id: None,
            weixin_id: None,
            social_login_hash: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_avatar(mut self, avatar: impl Into<String>) -> Self {
        self.avatar = Some(avatar.into());
        self
    }

    pub fn with_role(mut self, role: UserRole) -> Self {
        self.role = role;
        self
    }

    pub fn with_provider_id(mut self, provider: SocialProvider, id: impl Into<String>) -> Self {
        self.set_provider_id(provider, id);
        self
    }

    /// The external identity id this user holds for a provider, if any.
    pub fn provider_id(&self, provider: SocialProvider) -> Option<&str> {
        match provider {
            SocialProvider::Github => self.github_id.as_deref(),
            SocialProvider::Google => self.google_id.as_deref(),
            SocialProvider::Bitbucket => self.bitbucket_id.as_deref(),
            SocialProvider::Weixin => self.weixin_id.as_deref(),
        }
    }

    pub fn set_provider_id(&mut self, provider: SocialProvider, id: impl Into<String>) {
        let id = Some(id.into());
        match provider {
            SocialProvider::Github => self.github_id = id,
            SocialProvider::Google => self.google_id = id,
            SocialProvider::Bitbucket => self.bitbucket_id = id,
            SocialProvider::Weixin => self.weixin_id = id,
        }
        self.updated_at = Utc::now();
    }

    /// Whether this account may authenticate at all.
    pub fn can_authenticate(&self) -> bool {
        self.enabled && !self.deleted
    }
}
