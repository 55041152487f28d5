//! Authentication Configuration
//!
//! Explicit settings structs built once at startup and handed to each
//! component at construction. Business logic never reads the environment.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TK_AUTH_STRATEGY` | `refresh` | `token`, `session` or `refresh` |
//! | `TK_JWT_SECRET` | generated | HS256 signing key |
//! | `TK_LOCKOUT_WINDOW_MINUTES` | `30` | Sliding abuse window |
//! | `TK_MAX_ATTEMPTS_PER_IP` | `50` | Failed attempts per IP in window |
//! | `TK_MAX_ATTEMPTS_PER_IP_AND_USER` | `5` | Failed attempts per (IP, username) |
//! | `TK_TOKEN_EXPIRY_SHORT_SECS` | `600` | Short token lifetime (10 minutes) |
//! | `TK_TOKEN_EXPIRY_MEDIUM_SECS` | `14400` | Medium token lifetime (4 hours) |
//! | `TK_TOKEN_EXPIRY_LONG_SECS` | `2628000` | Long token lifetime (730 hours) |
//! | `TK_CLIENT_URL` | `http://localhost:8080` | SPA base URL for social redirects |
//! | `TK_EXTERNAL_BASE_URL` | - | Public base URL for provider callbacks |
//! | `TK_<PROVIDER>_CLIENT_ID` | - | OAuth client id (GITHUB/GOOGLE/BITBUCKET/WEIXIN) |
//! | `TK_<PROVIDER>_CLIENT_SECRET` | - | OAuth client secret |
//! | `TK_<PROVIDER>_REQUIRE_TLS` | `true` | Force https on callback/redirect URLs |

use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use tracing::warn;

use crate::shared::error::{AuthError, Result};
use crate::social::provider::SocialProvider;

/// Which authentication strategy the process runs. Exactly one is active
/// for the lifetime of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    /// Stateless signed token carrying user claims.
    Token,
    /// Server-side session referenced by the token.
    Session,
    /// Short-lived access token plus rotating session-backed refresh token.
    Refresh,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Token => "token",
            StrategyKind::Session => "session",
            StrategyKind::Refresh => "refresh",
        }
    }
}

impl Default for StrategyKind {
    fn default() -> Self {
        StrategyKind::Refresh
    }
}

impl FromStr for StrategyKind {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "token" => Ok(StrategyKind::Token),
            "session" => Ok(StrategyKind::Session),
            "refresh" => Ok(StrategyKind::Refresh),
            other => Err(AuthError::configuration(format!(
                "unknown auth strategy '{}', expected token, session or refresh",
                other
            ))),
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Token lifetimes in seconds.
#[derive(Debug, Clone, Copy)]
pub struct TokenLifetimes {
    pub short_secs: i64,
    pub medium_secs: i64,
    pub long_secs: i64,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            short_secs: 600,         // 10 minutes
            medium_secs: 14_400,     // 4 hours
            long_secs: 2_628_000,    // 730 hours
        }
    }
}

impl TokenLifetimes {
    pub fn short(&self) -> Duration {
        Duration::seconds(self.short_secs)
    }

    pub fn medium(&self) -> Duration {
        Duration::seconds(self.medium_secs)
    }

    pub fn long(&self) -> Duration {
        Duration::seconds(self.long_secs)
    }
}

/// Thresholds for the sliding-window abuse check.
#[derive(Debug, Clone, Copy)]
pub struct AbusePolicy {
    pub lockout_window_minutes: i64,
    pub max_attempts_per_ip: u64,
    pub max_attempts_per_ip_and_user: u64,
}

impl Default for AbusePolicy {
    fn default() -> Self {
        Self {
            lockout_window_minutes: 30,
            max_attempts_per_ip: 50,
            max_attempts_per_ip_and_user: 5,
        }
    }
}

impl AbusePolicy {
    /// Start of the sliding window, measured backward from `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::minutes(self.lockout_window_minutes)
    }

    /// Reaching either threshold blocks the attempt.
    pub fn is_blocked(&self, ip_attempts: u64, ip_and_user_attempts: u64) -> bool {
        ip_attempts >= self.max_attempts_per_ip
            || ip_and_user_attempts >= self.max_attempts_per_ip_and_user
    }
}

/// OAuth client settings for one social provider.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub client_id: String,
    pub client_secret: String,
    /// Force https on callback and redirect URLs. Disable only in development.
    pub require_tls: bool,
}

/// Configured social providers. A provider without credentials is absent.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    pub github: Option<ProviderSettings>,
    pub google: Option<ProviderSettings>,
    pub bitbucket: Option<ProviderSettings>,
    pub weixin: Option<ProviderSettings>,
}

impl ProviderRegistry {
    pub fn get(&self, provider: SocialProvider) -> Option<&ProviderSettings> {
        match provider {
            SocialProvider::Github => self.github.as_ref(),
            SocialProvider::Google => self.google.as_ref(),
            SocialProvider::Bitbucket => self.bitbucket.as_ref(),
            SocialProvider::Weixin => self.weixin.as_ref(),
        }
    }
}

/// Process-wide authentication settings, loaded once at startup.
#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub strategy: StrategyKind,
    pub signing_key: String,
    pub lifetimes: TokenLifetimes,
    pub abuse: AbusePolicy,
    pub providers: ProviderRegistry,
    /// Base URL of the client application, target of social-login redirects.
    pub client_url: String,
    /// Public base URL of this service, used to build provider callback URLs.
    /// Falls back to the request host when unset.
    pub external_base_url: Option<String>,
}

impl AuthSettings {
    pub fn from_env() -> Result<Self> {
        let strategy = env_or("TK_AUTH_STRATEGY", "refresh").parse()?;

        let signing_key = match std::env::var("TK_JWT_SECRET") {
            Ok(key) if !key.is_empty() => key,
            _ => {
                let key = generate_signing_key();
                warn!("TK_JWT_SECRET not set, generated an ephemeral signing key; tokens will not survive a restart");
                key
            }
        };

        let defaults = TokenLifetimes::default();
        let lifetimes = TokenLifetimes {
            short_secs: env_or_parse("TK_TOKEN_EXPIRY_SHORT_SECS", defaults.short_secs),
            medium_secs: env_or_parse("TK_TOKEN_EXPIRY_MEDIUM_SECS", defaults.medium_secs),
            long_secs: env_or_parse("TK_TOKEN_EXPIRY_LONG_SECS", defaults.long_secs),
        };

        let policy = AbusePolicy::default();
        let abuse = AbusePolicy {
            lockout_window_minutes: env_or_parse("TK_LOCKOUT_WINDOW_MINUTES", policy.lockout_window_minutes),
            max_attempts_per_ip: env_or_parse("TK_MAX_ATTEMPTS_PER_IP", policy.max_attempts_per_ip),
            max_attempts_per_ip_and_user: env_or_parse(
                "TK_MAX_ATTEMPTS_PER_IP_AND_USER",
                policy.max_attempts_per_ip_and_user,
            ),
        };

        let providers = ProviderRegistry {
            github: provider_from_env("GITHUB"),
            google: provider_from_env("GOOGLE"),
            bitbucket: provider_from_env("BITBUCKET"),
            weixin: provider_from_env("WEIXIN"),
        };

        Ok(Self {
            strategy,
            signing_key,
            lifetimes,
            abuse,
            providers,
            client_url: env_or("TK_CLIENT_URL", "http://localhost:8080"),
            external_base_url: std::env::var("TK_EXTERNAL_BASE_URL").ok().filter(|v| !v.is_empty()),
        })
    }
}

fn provider_from_env(name: &str) -> Option<ProviderSettings> {
    let client_id = std::env::var(format!("TK_{}_CLIENT_ID", name)).ok()?;
    let client_secret = std::env::var(format!("TK_{}_CLIENT_SECRET", name)).ok()?;
    if client_id.is_empty() || client_secret.is_empty() {
        return None;
    }
    let require_tls = env_or_parse(&format!("TK_{}_REQUIRE_TLS", name), true);
    Some(ProviderSettings { client_id, client_secret, require_tls })
}

fn generate_signing_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("token".parse::<StrategyKind>().unwrap(), StrategyKind::Token);
        assert_eq!("SESSION".parse::<StrategyKind>().unwrap(), StrategyKind::Session);
        assert_eq!("Refresh".parse::<StrategyKind>().unwrap(), StrategyKind::Refresh);
        assert!("jwt".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn test_default_lifetimes() {
        let lifetimes = TokenLifetimes::default();
        assert_eq!(lifetimes.short().num_minutes(), 10);
        assert_eq!(lifetimes.medium().num_hours(), 4);
        assert_eq!(lifetimes.long().num_hours(), 730);
    }

    #[test]
    fn test_abuse_thresholds_are_inclusive() {
        let policy = AbusePolicy::default();
        assert!(!policy.is_blocked(49, 4));
        assert!(policy.is_blocked(50, 0));
        assert!(policy.is_blocked(0, 5));
        assert!(policy.is_blocked(120, 7));
    }

    #[test]
    fn test_pair_threshold_blocks_sixth_attempt() {
        // Five failures for one (ip, username) pair lock the pair out.
        let policy = AbusePolicy::default();
        assert!(!policy.is_blocked(4, 4));
        assert!(policy.is_blocked(5, 5));
    }

    #[test]
    fn test_window_start() {
        let policy = AbusePolicy { lockout_window_minutes: 30, ..AbusePolicy::default() };
        let now = Utc::now();
        assert_eq!(now - policy.window_start(now), Duration::minutes(30));
    }

    #[test]
    fn test_generated_signing_key_is_distinct() {
        assert_ne!(generate_signing_key(), generate_signing_key());
    }
}
