//! ProviderClient Unit Tests
//!
//! Tests for:
//! - Authorization-code exchange against the token endpoint
//! - Profile fetching with provider-specific headers
//! - Weixin parameter dialect (query credentials, errcode bodies, openid)
//! - Rejecting and unreachable providers

use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tk_auth::config::ProviderSettings;
use tk_auth::social::{ProviderClient, ProviderToken, SocialProvider};
use tk_auth::AuthError;

fn settings() -> ProviderSettings {
    ProviderSettings {
        client_id: "client-123".to_string(),
        client_secret: "secret-456".to_string(),
        require_tls: true,
    }
}

fn bearer_token(access_token: &str) -> ProviderToken {
    ProviderToken {
        access_token: access_token.to_string(),
        openid: None,
    }
}

#[tokio::test]
async fn test_exchange_code_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .and(header("Accept", "application/json"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=auth-code-1"))
        .and(body_string_contains("client_id=client-123"))
        .and(body_string_contains("client_secret=secret-456"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "provider-token-1",
            "token_type": "bearer",
            "scope": "user:email"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ProviderClient::new();
    let token = client
        .exchange_code(
            SocialProvider::Github,
            &settings(),
            &format!("{}/login/oauth/access_token", mock_server.uri()),
            "auth-code-1",
            "https://api.example.com/auth/github/callback",
        )
        .await
        .unwrap();

    assert_eq!(token.access_token, "provider-token-1");
    assert!(token.openid.is_none());
}

#[tokio::test]
async fn test_exchange_code_rejected() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ProviderClient::new();
    let err = client
        .exchange_code(
            SocialProvider::Github,
            &settings(),
            &format!("{}/token", mock_server.uri()),
            "expired-code",
            "https://api.example.com/auth/github/callback",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Unauthorized { .. }));
    assert!(err.to_string().contains("rejected the authorization code"));
}

#[tokio::test]
async fn test_exchange_code_without_access_token() {
    let mock_server = MockServer::start().await;

    // Github answers 200 with an error body when the code was already used.
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "error": "bad_verification_code"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ProviderClient::new();
    let err = client
        .exchange_code(
            SocialProvider::Github,
            &settings(),
            &format!("{}/token", mock_server.uri()),
            "used-code",
            "https://api.example.com/auth/github/callback",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Unauthorized { .. }));
}

#[tokio::test]
async fn test_weixin_exchange_uses_query_credentials() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sns/oauth2/access_token"))
        .and(query_param("appid", "client-123"))
        .and(query_param("secret", "secret-456"))
        .and(query_param("code", "wx-code"))
        .and(query_param("grant_type", "authorization_code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "wx-token",
            "openid": "wx-openid-9",
            "expires_in": 7200
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ProviderClient::new();
    let token = client
        .exchange_code(
            SocialProvider::Weixin,
            &settings(),
            &format!("{}/sns/oauth2/access_token", mock_server.uri()),
            "wx-code",
            "https://api.example.com/auth/weixin/callback",
        )
        .await
        .unwrap();

    assert_eq!(token.access_token, "wx-token");
    assert_eq!(token.openid.as_deref(), Some("wx-openid-9"));
}

#[tokio::test]
async fn test_weixin_errcode_in_success_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sns/oauth2/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "errcode": 40029,
            "errmsg": "invalid code"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ProviderClient::new();
    let err = client
        .exchange_code(
            SocialProvider::Weixin,
            &settings(),
            &format!("{}/sns/oauth2/access_token", mock_server.uri()),
            "bad-code",
            "https://api.example.com/auth/weixin/callback",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Unauthorized { .. }));
}

#[tokio::test]
async fn test_fetch_profile_sends_bearer_and_user_agent() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("Authorization", "Bearer provider-token-1"))
        .and(header("User-Agent", "turnkey-auth"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "id": 27052900,
            "login": "octocat",
            "email": "octocat@example.com"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ProviderClient::new();
    let payload = client
        .fetch_profile(
            SocialProvider::Github,
            &format!("{}/user", mock_server.uri()),
            &bearer_token("provider-token-1"),
        )
        .await
        .unwrap();

    assert_eq!(payload["login"], "octocat");
}

#[tokio::test]
async fn test_weixin_profile_echoes_openid() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/sns/userinfo"))
        .and(query_param("access_token", "wx-token"))
        .and(query_param("openid", "wx-openid-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "openid": "wx-openid-9",
            "nickname": "someone",
            "unionid": "wx-union-1"
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ProviderClient::new();
    let token = ProviderToken {
        access_token: "wx-token".to_string(),
        openid: Some("wx-openid-9".to_string()),
    };
    let payload = client
        .fetch_profile(
            SocialProvider::Weixin,
            &format!("{}/sns/userinfo", mock_server.uri()),
            &token,
        )
        .await
        .unwrap();

    assert_eq!(payload["unionid"], "wx-union-1");
}

#[tokio::test]
async fn test_weixin_profile_without_openid() {
    // Fails before any request goes out, so no server is needed.
    let client = ProviderClient::new();
    let err = client
        .fetch_profile(
            SocialProvider::Weixin,
            "http://127.0.0.1:59999/sns/userinfo",
            &bearer_token("wx-token"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Unauthorized { .. }));
    assert!(err.to_string().contains("no openid"));
}

#[tokio::test]
async fn test_fetch_profile_rejected_token() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = ProviderClient::new();
    let err = client
        .fetch_profile(
            SocialProvider::Github,
            &format!("{}/user", mock_server.uri()),
            &bearer_token("revoked-token"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Unauthorized { .. }));
    assert!(err.to_string().contains("rejected the access token"));
}

#[tokio::test]
async fn test_unreachable_provider_is_retryable() {
    let client = ProviderClient::new();
    // Use a port that's definitely not listening
    let err = client
        .exchange_code(
            SocialProvider::Github,
            &settings(),
            "http://127.0.0.1:59999/token",
            "auth-code-1",
            "https://api.example.com/auth/github/callback",
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AuthError::Unavailable { .. }));
    assert!(err.to_string().contains("token endpoint unreachable"));
}
