//! Token Service
//!
//! Signed-token issuance and verification (HS256) for every token kind:
//! access and refresh tokens for the three strategies, one-minute exchange
//! tokens for the social bridge, and the state token protecting the
//! outbound social leg. Tokens are never persisted; a token is valid if
//! its signature and expiry check out and, where it references a session,
//! the session still validates.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::TokenLifetimes;
use crate::session::entity::Session;
use crate::shared::error::{AuthError, Result};
use crate::social::provider::SocialProvider;
use crate::user::entity::{User, UserRole};

/// Exchange tokens cover one redirect round-trip and nothing more.
pub const EXCHANGE_TOKEN_TTL_SECS: i64 = 60;

/// State tokens cover the walk to the provider's consent page and back.
pub const STATE_TOKEN_TTL_SECS: i64 = 600;

/// User claims embedded in a signed token
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenUser {
    #[serde(rename = "_id")]
    pub id: String,
    pub username: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for TokenUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id.clone(),
            username: user.username.clone(),
            role: user.role,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Claims for access and refresh tokens. A token carries either direct
/// user claims or a session reference; which fields are present is the
/// kind discriminator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<TokenUser>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    /// Raw session secret; only its digest exists server-side
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_key: Option<String>,

    /// Password-digest snapshot carried with the session reference
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_hash: Option<String>,

    pub exp: i64,
    pub iat: i64,
}

/// The session fields of a claim set, once known to all be present.
#[derive(Debug, Clone)]
pub struct SessionReference {
    pub session_id: String,
    pub session_key: String,
    pub password_hash: String,
}

impl Claims {
    pub fn session_reference(&self) -> Option<SessionReference> {
        match (&self.session_id, &self.session_key, &self.password_hash) {
            (Some(id), Some(key), Some(hash)) => Some(SessionReference {
                session_id: id.clone(),
                session_key: key.clone(),
                password_hash: hash.clone(),
            }),
            _ => None,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.exp <= Utc::now().timestamp()
    }
}

/// Claims for the single-use social exchange token. Carries the user's
/// identity and the raw correlation key whose digest sits on the user row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeClaims {
    pub username: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub github_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitbucket_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weixin_id: Option<String>,

    /// One-time correlation key
    pub key: String,

    pub exp: i64,
    pub iat: i64,
}

impl ExchangeClaims {
    pub fn new(user: &User, key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            username: user.username.clone(),
            github_id: user.github_id.clone(),
            google_id: user.google_id.clone(),
            bitbucket_id: user.bitbucket_id.clone(),
            weixin_id: user.weixin_id.clone(),
            key: key.into(),
            exp: (now + Duration::seconds(EXCHANGE_TOKEN_TTL_SECS)).timestamp(),
            iat: now.timestamp(),
        }
    }

    /// Field and value to look the user up by at redemption time.
    /// Provider ids are checked in a fixed order so the lookup is
    /// deterministic; the username is the fallback.
    pub fn lookup(&self) -> (&'static str, &str) {
        if let Some(id) = self.github_id.as_deref() {
            return ("githubId", id);
        }
        if let Some(id) = self.google_id.as_deref() {
            return ("googleId", id);
        }
        if let Some(id) = self.bitbucket_id.as_deref() {
            return ("bitbucketId", id);
        }
        if let Some(id) = self.weixin_id.as_deref() {
            return ("weixinId", id);
        }
        ("username", &self.username)
    }
}

/// Claims for the signed state parameter on the outbound social leg.
/// Keeping state stateless avoids a store round-trip per authorize call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateClaims {
    pub provider: SocialProvider,
    pub nonce: String,
    pub exp: i64,
    pub iat: i64,
}

impl StateClaims {
    pub fn new(provider: SocialProvider, nonce: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            provider,
            nonce: nonce.into(),
            exp: (now + Duration::seconds(STATE_TOKEN_TTL_SECS)).timestamp(),
            iat: now.timestamp(),
        }
    }
}

/// Token signing and verification service
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    lifetimes: TokenLifetimes,
}

impl TokenService {
    pub fn new(signing_key: &str, lifetimes: TokenLifetimes) -> Self {
        let encoding_key = EncodingKey::from_secret(signing_key.as_bytes());
        let decoding_key = DecodingKey::from_secret(signing_key.as_bytes());

        info!("TokenService initialized with HS256");

        Self {
            encoding_key,
            decoding_key,
            lifetimes,
        }
    }

    pub fn lifetimes(&self) -> TokenLifetimes {
        self.lifetimes
    }

    /// Sign a token carrying direct user claims
    pub fn issue_user_token(&self, user: &User, ttl: Duration) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            user: Some(TokenUser::from(user)),
            session_id: None,
            session_key: None,
            password_hash: None,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        self.sign(&claims)
    }

    /// Sign a token carrying a session reference. The raw secret goes to
    /// the client inside the signed payload; the store only has its digest.
    pub fn issue_session_token(
        &self,
        session: &Session,
        raw_secret: &str,
        ttl: Duration,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            user: None,
            session_id: Some(session.id.clone()),
            session_key: Some(raw_secret.to_string()),
            password_hash: Some(session.password_hash.clone()),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };
        self.sign(&claims)
    }

    pub fn issue_exchange_token(&self, claims: &ExchangeClaims) -> Result<String> {
        self.sign(claims)
    }

    pub fn issue_state_token(&self, claims: &StateClaims) -> Result<String> {
        self.sign(claims)
    }

    /// Verify signature and expiry
    pub fn verify(&self, token: &str) -> Result<Claims> {
        self.decode_claims(token, Validation::new(Algorithm::HS256))
    }

    /// Verify the signature only. The caller inspects `Claims::is_expired`
    /// itself to tell an expired access token from an expired refresh
    /// token.
    pub fn verify_ignoring_expiry(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        self.decode_claims(token, validation)
    }

    /// Verify an exchange token. No leeway: the one-minute promise is
    /// part of the bridge's security posture.
    pub fn verify_exchange(&self, token: &str) -> Result<ExchangeClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        self.decode_claims(token, validation)
    }

    pub fn verify_state(&self, token: &str) -> Result<StateClaims> {
        self.decode_claims(token, Validation::new(Algorithm::HS256))
    }

    fn sign<T: Serialize>(&self, claims: &T) -> Result<String> {
        let header = Header::new(Algorithm::HS256);
        encode(&header, claims, &self.encoding_key).map_err(|e| AuthError::Internal {
            message: format!("Failed to encode token: {}", e),
        })
    }

    fn decode_claims<T: DeserializeOwned>(
        &self,
        token: &str,
        validation: Validation,
    ) -> Result<T> {
        decode::<T>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    AuthError::unauthorized("Expired Access Token")
                }
                _ => AuthError::unauthorized("Invalid token"),
            })
    }
}

/// Extract bearer token from Authorization header
pub fn extract_bearer_token(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}
