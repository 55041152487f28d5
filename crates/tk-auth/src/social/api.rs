//! Social Login Endpoints
//!
//! Browser-facing OAuth flow plus exchange-token redemption:
//! 1. GET /auth/{provider} - Redirects to the provider's consent page
//! 2. User authenticates at the provider
//! 3. GET /auth/{provider}/callback - Exchanges the code and redirects to
//!    the client application with a one-minute exchange token in the URL
//! 4. POST /login/social - Redeems the exchange token for strategy tokens

use axum::{
    extract::{Host, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, warn};
use utoipa::{IntoParams, ToSchema};

use crate::auth::login_api::LoginResponse;
use crate::config::ProviderRegistry;
use crate::shared::error::{ErrorResponse, Result};
use crate::social::provider::SocialProvider;
use crate::social::service::SocialLoginService;

/// Social API state
#[derive(Clone)]
pub struct SocialApiState {
    pub social_service: Arc<SocialLoginService>,
    pub providers: ProviderRegistry,
    /// Base URL of the client application, target of every redirect
    pub client_url: String,
    /// External base URL for callbacks (e.g., "https://auth.example.com")
    pub external_base_url: Option<String>,
}

/// Provider callback query parameters
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SocialCallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Exchange-token redemption request
#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SocialLoginRequest {
    /// Exchange token from the callback redirect
    pub token: String,
}

/// Redirect the browser to the provider's consent page
#[utoipa::path(
    get,
    path = "/auth/{provider}",
    tag = "social-login",
    operation_id = "getAuthProvider",
    params(
        ("provider" = String, Path, description = "Provider name: github, google, bitbucket or weixin")
    ),
    responses(
        (status = 303, description = "Redirect to provider"),
        (status = 404, description = "Unknown or unconfigured provider"),
        (status = 500, description = "Internal error")
    )
)]
pub async fn social_authorize(
    State(state): State<SocialApiState>,
    Host(host): Host,
    Path(provider): Path<String>,
) -> Response {
    let provider = match provider.parse::<SocialProvider>() {
        Ok(p) => p,
        Err(_) => {
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "NOT_FOUND".to_string(),
                    message: format!("Unknown social provider: {}", provider),
                }),
            )
                .into_response();
        }
    };

    let Some(settings) = state.providers.get(provider) else {
        return (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "NOT_FOUND".to_string(),
                message: format!("{} login is not configured", provider),
            }),
        )
            .into_response();
    };

    let callback_url = get_callback_url(&state, provider, settings.require_tls, &host);

    match state
        .social_service
        .authorize_redirect(provider, settings, &callback_url)
    {
        Ok(url) => {
            info!(%provider, "redirecting to social provider");
            (StatusCode::SEE_OTHER, [(header::LOCATION, url)]).into_response()
        }
        Err(e) => {
            warn!(%provider, error = %e, "failed to build authorization redirect");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "INTERNAL_ERROR".to_string(),
                    message: "Failed to initiate login".to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Handle the provider callback
#[utoipa::path(
    get,
    path = "/auth/{provider}/callback",
    tag = "social-login",
    operation_id = "getAuthProviderCallback",
    params(
        ("provider" = String, Path, description = "Provider name"),
        SocialCallbackParams
    ),
    responses(
        (status = 303, description = "Redirect to client application")
    )
)]
pub async fn social_callback(
    State(state): State<SocialApiState>,
    Host(host): Host,
    Path(provider): Path<String>,
    Query(params): Query<SocialCallbackParams>,
) -> Response {
    let provider = match provider.parse::<SocialProvider>() {
        Ok(p) => p,
        Err(_) => return error_redirect(&state.client_url, "Unknown social provider"),
    };

    // Provider-reported errors (user denied consent, etc.)
    if let Some(error) = &params.error {
        warn!(
            %provider,
            error = %error,
            description = params.error_description.as_deref().unwrap_or(""),
            "social callback error"
        );
        return error_redirect(
            &state.client_url,
            params.error_description.as_deref().unwrap_or(error),
        );
    }

    let code = match &params.code {
        Some(c) if !c.is_empty() => c,
        _ => return error_redirect(&state.client_url, "No authorization code received"),
    };

    let oauth_state = match &params.state {
        Some(s) if !s.is_empty() => s,
        _ => return error_redirect(&state.client_url, "No state parameter received"),
    };

    if let Err(e) = state.social_service.verify_state(provider, oauth_state) {
        warn!(%provider, error = %e, "invalid state parameter");
        return error_redirect(
            &state.client_url,
            "Invalid or expired login state. Please try again.",
        );
    }

    let Some(settings) = state.providers.get(provider) else {
        return error_redirect(
            &state.client_url,
            "Social provider is not configured",
        );
    };

    let callback_url = get_callback_url(&state, provider, settings.require_tls, &host);

    let token = match state
        .social_service
        .handle_callback(provider, settings, code, &callback_url)
        .await
    {
        Ok(t) => t,
        Err(e) => {
            warn!(%provider, error = %e, "social callback failed");
            return error_redirect(
                &state.client_url,
                &format!("Authentication failed: {}", e.public_message()),
            );
        }
    };

    info!(%provider, "social login bridged, redirecting to client");

    let redirect_url = format!("{}/login/social?token={}", state.client_url, token);
    (StatusCode::SEE_OTHER, [(header::LOCATION, redirect_url)]).into_response()
}

/// Redeem an exchange token for strategy tokens
///
/// The access token is returned ready to use as an Authorization header
/// value.
#[utoipa::path(
    post,
    path = "/login/social",
    tag = "social-login",
    operation_id = "postLoginSocial",
    request_body = SocialLoginRequest,
    responses(
        (status = 200, description = "Redemption successful", body = LoginResponse),
        (status = 400, description = "Account is deleted"),
        (status = 401, description = "Invalid, expired or already redeemed token")
    )
)]
pub async fn redeem_social_login(
    State(state): State<SocialApiState>,
    Json(req): Json<SocialLoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (user, tokens) = state.social_service.redeem(&req.token).await?;

    Ok(Json(LoginResponse {
        user: user.into(),
        access_token: format!("Bearer {}", tokens.access_token),
        refresh_token: tokens.refresh_token,
    }))
}

// ==================== Helper Functions ====================

fn get_external_base_url(state: &SocialApiState, require_tls: bool, host: &str) -> String {
    state.external_base_url.clone().unwrap_or_else(|| {
        // Fall back to request host
        let scheme = if require_tls { "https" } else { "http" };
        format!("{}://{}", scheme, host)
    })
}

fn get_callback_url(
    state: &SocialApiState,
    provider: SocialProvider,
    require_tls: bool,
    host: &str,
) -> String {
    format!(
        "{}/auth/{}/callback",
        get_external_base_url(state, require_tls, host),
        provider
    )
}

fn error_redirect(client_url: &str, message: &str) -> Response {
    let error_url = format!(
        "{}/login/social?error={}",
        client_url,
        urlencoding::encode(message)
    );
    (StatusCode::SEE_OTHER, [(header::LOCATION, error_url)]).into_response()
}

/// Create the social login router
pub fn social_router(state: SocialApiState) -> Router {
    Router::new()
        .route("/auth/:provider", get(social_authorize))
        .route("/auth/:provider/callback", get(social_callback))
        .route("/login/social", post(redeem_social_login))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password_service::PasswordService;
    use crate::auth::strategy::AuthStrategy;
    use crate::auth::token_service::TokenService;
    use crate::auth::token_strategy::TokenStrategy;
    use crate::config::TokenLifetimes;
    use crate::user::repository::UserRepository;

    async fn state(external_base_url: Option<String>) -> SocialApiState {
        // The client is lazy; nothing here connects to a database.
        let client = mongodb::Client::with_uri_str("mongodb://localhost:27017")
            .await
            .unwrap();
        let db = client.database("turnkey_test");

        let users = Arc::new(UserRepository::new(&db));
        let tokens = Arc::new(TokenService::new("test-key", TokenLifetimes::default()));
        let strategy: Arc<dyn AuthStrategy> = Arc::new(TokenStrategy::new(tokens.clone()));
        let social_service = Arc::new(SocialLoginService::new(
            users,
            Arc::new(PasswordService::default()),
            tokens,
            strategy,
        ));

        SocialApiState {
            social_service,
            providers: ProviderRegistry::default(),
            client_url: "http://localhost:8080".to_string(),
            external_base_url,
        }
    }

    #[test]
    fn test_social_login_request_deserialization() {
        let json = r#"{"token":"exchange-token"}"#;
        let req: SocialLoginRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.token, "exchange-token");
    }

    #[test]
    fn test_error_redirect_targets_client_login_page() {
        let response = error_redirect("http://localhost:8080", "Authentication failed");
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let location = response.headers().get(header::LOCATION).unwrap();
        assert_eq!(
            location.to_str().unwrap(),
            "http://localhost:8080/login/social?error=Authentication%20failed"
        );
    }

    #[tokio::test]
    async fn test_callback_url_prefers_external_base() {
        let state = state(Some("https://auth.example.com".to_string())).await;
        let url = get_callback_url(&state, SocialProvider::Github, false, "internal:3000");
        assert_eq!(url, "https://auth.example.com/auth/github/callback");
    }

    #[tokio::test]
    async fn test_callback_url_falls_back_to_request_host() {
        let state = state(None).await;

        let url = get_callback_url(&state, SocialProvider::Google, true, "auth.example.com");
        assert_eq!(url, "https://auth.example.com/auth/google/callback");

        let url = get_callback_url(&state, SocialProvider::Weixin, false, "localhost:3000");
        assert_eq!(url, "http://localhost:3000/auth/weixin/callback");
    }
}
