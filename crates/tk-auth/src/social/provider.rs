//! Social Providers
//!
//! The four supported OAuth providers and how each one's profile payload
//! maps onto a normalized profile. All four run through the same bridge
//! machinery; only endpoints and payload shapes differ.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::shared::error::{AuthError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SocialProvider {
    Github,
    Google,
    Bitbucket,
    Weixin,
}

impl SocialProvider {
    pub const ALL: [SocialProvider; 4] = [
        SocialProvider::Github,
        SocialProvider::Google,
        SocialProvider::Bitbucket,
        SocialProvider::Weixin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SocialProvider::Github => "github",
            SocialProvider::Google => "google",
            SocialProvider::Bitbucket => "bitbucket",
            SocialProvider::Weixin => "weixin",
        }
    }

    /// Name of the user field holding this provider's external id.
    pub fn id_field(&self) -> &'static str {
        match self {
            SocialProvider::Github => "githubId",
            SocialProvider::Google => "googleId",
            SocialProvider::Bitbucket => "bitbucketId",
            SocialProvider::Weixin => "weixinId",
        }
    }

    pub fn authorize_url(&self) -> &'static str {
        match self {
            SocialProvider::Github => "https://github.com/login/oauth/authorize",
            SocialProvider::Google => "https://accounts.google.com/o/oauth2/v2/auth",
            SocialProvider::Bitbucket => "https://bitbucket.org/site/oauth2/authorize",
            SocialProvider::Weixin => "https://open.weixin.qq.com/connect/qrconnect",
        }
    }

    pub fn token_url(&self) -> &'static str {
        match self {
            SocialProvider::Github => "https://github.com/login/oauth/access_token",
            SocialProvider::Google => "https://www.googleapis.com/oauth2/v4/token",
            SocialProvider::Bitbucket => "https://bitbucket.org/site/oauth2/access_token",
            SocialProvider::Weixin => "https://api.weixin.qq.com/sns/oauth2/access_token",
        }
    }

    pub fn profile_url(&self) -> &'static str {
        match self {
            SocialProvider::Github => "https://api.github.com/user",
            SocialProvider::Google => "https://www.googleapis.com/oauth2/v3/userinfo",
            SocialProvider::Bitbucket => "https://api.bitbucket.org/2.0/user",
            SocialProvider::Weixin => "https://api.weixin.qq.com/sns/userinfo",
        }
    }

    pub fn scope(&self) -> &'static str {
        match self {
            SocialProvider::Github => "user:email",
            SocialProvider::Google => "profile email",
            SocialProvider::Bitbucket => "account",
            SocialProvider::Weixin => "snsapi_login",
        }
    }

    /// Weixin speaks its own dialect: `appid`/`secret` request parameters
    /// and an `openid` the profile call must echo back.
    pub fn uses_weixin_params(&self) -> bool {
        matches!(self, SocialProvider::Weixin)
    }

    /// Map a provider profile payload onto the normalized shape.
    pub fn parse_profile(&self, raw: &serde_json::Value) -> Result<SocialProfile> {
        match self {
            SocialProvider::Github => {
                let id = require_id(raw, "id", self)?;
                let username = require_str(raw, "login", self)?;
                Ok(SocialProfile {
                    provider_id: id,
                    username,
                    email: optional_str(raw, "email"),
                    avatar: optional_str(raw, "avatar_url"),
                    introduction: optional_str(raw, "bio"),
                })
            }
            SocialProvider::Google => {
                let id = require_str(raw, "sub", self)?;
                let email = require_str(raw, "email", self)?;
                Ok(SocialProfile {
                    provider_id: id,
                    username: email.clone(),
                    email: Some(email),
                    avatar: optional_str(raw, "picture"),
                    introduction: None,
                })
            }
            SocialProvider::Bitbucket => {
                let id = require_str(raw, "uuid", self)?;
                let username = require_str(raw, "username", self)?;
                let avatar = raw
                    .pointer("/links/avatar/href")
                    .and_then(|v| v.as_str())
                    .map(String::from);
                Ok(SocialProfile {
                    provider_id: id,
                    username,
                    email: None,
                    avatar,
                    introduction: None,
                })
            }
            SocialProvider::Weixin => {
                // The unionid is stable across apps of one account; the
                // openid is not. Identity hangs off the unionid.
                let unionid = require_str(raw, "unionid", self)?;
                Ok(SocialProfile {
                    provider_id: unionid.clone(),
                    username: unionid,
                    email: None,
                    avatar: optional_str(raw, "headimgurl"),
                    introduction: None,
                })
            }
        }
    }
}

impl FromStr for SocialProvider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "github" => Ok(SocialProvider::Github),
            "google" => Ok(SocialProvider::Google),
            "bitbucket" => Ok(SocialProvider::Bitbucket),
            "weixin" => Ok(SocialProvider::Weixin),
            other => Err(AuthError::validation(format!(
                "unknown social provider '{}'",
                other
            ))),
        }
    }
}

impl std::fmt::Display for SocialProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Provider profile normalized to what the bridge needs
#[derive(Debug, Clone)]
pub struct SocialProfile {
    pub provider_id: String,
    pub username: String,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub introduction: Option<String>,
}

fn require_str(raw: &serde_json::Value, field: &str, provider: &SocialProvider) -> Result<String> {
    raw.get(field)
        .and_then(|v| v.as_str())
        .map(String::from)
        .ok_or_else(|| {
            AuthError::internal(format!("{} profile missing '{}'", provider, field))
        })
}

/// Github sends its id as a number; everyone else sends strings.
fn require_id(raw: &serde_json::Value, field: &str, provider: &SocialProvider) -> Result<String> {
    match raw.get(field) {
        Some(serde_json::Value::Number(n)) => Ok(n.to_string()),
        Some(serde_json::Value::String(s)) => Ok(s.clone()),
        _ => Err(AuthError::internal(format!(
            "{} profile missing '{}'",
            provider, field
        ))),
    }
}

fn optional_str(raw: &serde_json::Value, field: &str) -> Option<String> {
    raw.get(field).and_then(|v| v.as_str()).map(String::from)
}
