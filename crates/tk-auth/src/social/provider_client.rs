//! Provider Client
//!
//! Outbound OAuth legs against the social providers: building the
//! authorize redirect, exchanging a callback code for an access token,
//! and fetching the profile. Every request carries an explicit timeout;
//! a timed-out or unreachable provider surfaces as a retryable failure,
//! never as a denied login.

use std::time::Duration;

use tracing::warn;

use crate::config::ProviderSettings;
use crate::shared::error::{AuthError, Result};
use crate::social::provider::SocialProvider;

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Access token returned by a provider's token endpoint. Weixin also
/// hands back an `openid` the profile call must echo.
#[derive(Debug, Clone)]
pub struct ProviderToken {
    pub access_token: String,
    pub openid: Option<String>,
}

pub struct ProviderClient {
    http: reqwest::Client,
}

impl ProviderClient {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// The URL to send the browser to for the provider's consent page.
    pub fn build_authorize_url(
        &self,
        provider: SocialProvider,
        settings: &ProviderSettings,
        callback_url: &str,
        state: &str,
    ) -> String {
        if provider.uses_weixin_params() {
            // Weixin wants `appid` and insists on a trailing fragment.
            format!(
                "{}?appid={}&redirect_uri={}&response_type=code&scope={}&state={}#wechat_redirect",
                provider.authorize_url(),
                urlencoding::encode(&settings.client_id),
                urlencoding::encode(callback_url),
                urlencoding::encode(provider.scope()),
                urlencoding::encode(state),
            )
        } else {
            format!(
                "{}?response_type=code&client_id={}&redirect_uri={}&scope={}&state={}",
                provider.authorize_url(),
                urlencoding::encode(&settings.client_id),
                urlencoding::encode(callback_url),
                urlencoding::encode(provider.scope()),
                urlencoding::encode(state),
            )
        }
    }

    /// Exchange the authorization code for an access token against the
    /// given token endpoint.
    pub async fn exchange_code(
        &self,
        provider: SocialProvider,
        settings: &ProviderSettings,
        token_url: &str,
        code: &str,
        callback_url: &str,
    ) -> Result<ProviderToken> {
        let response = if provider.uses_weixin_params() {
            self.http
                .get(token_url)
                .query(&[
                    ("appid", settings.client_id.as_str()),
                    ("secret", settings.client_secret.as_str()),
                    ("code", code),
                    ("grant_type", "authorization_code"),
                ])
                .timeout(PROVIDER_TIMEOUT)
                .send()
                .await
        } else {
            let params = [
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", callback_url),
                ("client_id", settings.client_id.as_str()),
                ("client_secret", settings.client_secret.as_str()),
            ];

            self.http
                .post(token_url)
                // Github answers form-encoded unless asked for JSON.
                .header("Accept", "application/json")
                .form(&params)
                .timeout(PROVIDER_TIMEOUT)
                .send()
                .await
        };

        let response = response.map_err(|e| provider_unreachable(provider, "token", e))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(%provider, %status, "provider token endpoint rejected the code");
            return Err(AuthError::unauthorized(
                "Authentication failed: provider rejected the authorization code",
            ));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| provider_unreachable(provider, "token", e))?;

        // Weixin reports errors inside a 200 body.
        if let Some(errcode) = json.get("errcode").and_then(|v| v.as_i64()) {
            warn!(%provider, errcode, "provider token endpoint returned an error body");
            return Err(AuthError::unauthorized(
                "Authentication failed: provider rejected the authorization code",
            ));
        }

        let access_token = json
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                AuthError::unauthorized("Authentication failed: no access token in response")
            })?
            .to_string();

        Ok(ProviderToken {
            access_token,
            openid: json.get("openid").and_then(|v| v.as_str()).map(String::from),
        })
    }

    /// Fetch the raw profile payload for a token from the given endpoint.
    pub async fn fetch_profile(
        &self,
        provider: SocialProvider,
        profile_url: &str,
        token: &ProviderToken,
    ) -> Result<serde_json::Value> {
        let request = if provider.uses_weixin_params() {
            let openid = token.openid.as_deref().ok_or_else(|| {
                AuthError::unauthorized("Authentication failed: no openid in response")
            })?;
            self.http
                .get(profile_url)
                .query(&[("access_token", token.access_token.as_str()), ("openid", openid)])
        } else {
            self.http
                .get(profile_url)
                .header("Authorization", format!("Bearer {}", token.access_token))
                // Github rejects requests without a user agent.
                .header("User-Agent", "turnkey-auth")
        };

        let response = request
            .timeout(PROVIDER_TIMEOUT)
            .send()
            .await
            .map_err(|e| provider_unreachable(provider, "profile", e))?;

        if !response.status().is_success() {
            let status = response.status();
            warn!(%provider, %status, "provider profile endpoint rejected the token");
            return Err(AuthError::unauthorized(
                "Authentication failed: provider rejected the access token",
            ));
        }

        response
            .json()
            .await
            .map_err(|e| provider_unreachable(provider, "profile", e))
    }
}

impl Default for ProviderClient {
    fn default() -> Self {
        Self::new()
    }
}

fn provider_unreachable(
    provider: SocialProvider,
    endpoint: &str,
    err: reqwest::Error,
) -> AuthError {
    warn!(%provider, endpoint, error = %err, "provider request failed");
    AuthError::unavailable(format!("{} {} endpoint unreachable", provider, endpoint))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ProviderSettings {
        ProviderSettings {
            client_id: "client-123".to_string(),
            client_secret: "secret-456".to_string(),
            require_tls: true,
        }
    }

    #[test]
    fn test_standard_authorize_url() {
        let client = ProviderClient::new();
        let url = client.build_authorize_url(
            SocialProvider::Github,
            &settings(),
            "https://api.example.com/auth/github/callback",
            "state-token",
        );

        assert!(url.starts_with("https://github.com/login/oauth/authorize?"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("redirect_uri=https%3A%2F%2Fapi.example.com%2Fauth%2Fgithub%2Fcallback"));
        assert!(url.contains("state=state-token"));
        assert!(!url.contains("secret-456"));
    }

    #[test]
    fn test_weixin_authorize_url() {
        let client = ProviderClient::new();
        let url = client.build_authorize_url(
            SocialProvider::Weixin,
            &settings(),
            "https://api.example.com/auth/weixin/callback",
            "state-token",
        );

        assert!(url.starts_with("https://open.weixin.qq.com/connect/qrconnect?appid=client-123"));
        assert!(url.contains("scope=snsapi_login"));
        assert!(url.ends_with("#wechat_redirect"));
    }
}
