//! API Middleware
//!
//! Authentication middleware for Axum. The layer validates the bearer
//! token before the handler runs and stashes the outcome in request
//! extensions; the `Authenticated` extractor reads it back. Running
//! validation in the layer rather than the extractor lets rotated tokens
//! ride out on the response as headers, whatever the handler returned.

use axum::{
    async_trait,
    extract::{ConnectInfo, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
};
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::warn;

use crate::auth::strategy::{AuthStrategy, Identity, Rotation};
use crate::auth::token_service::extract_bearer_token;
use crate::shared::error::ErrorResponse;

/// Response header carrying a renewed access token
pub const ACCESS_TOKEN_HEADER: &str = "X-Access-Token";

/// Response header carrying a rotated refresh token
pub const REFRESH_TOKEN_HEADER: &str = "X-Refresh-Token";

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub strategy: Arc<dyn AuthStrategy>,
}

/// Authenticated caller extractor
pub struct Authenticated(pub Identity);

impl std::ops::Deref for Authenticated {
    type Target = Identity;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Error response for authentication failures
pub struct AuthRejection {
    pub status: StatusCode,
    pub message: String,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: "UNAUTHORIZED".to_string(),
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Validation failure recorded by the layer for the extractor to report
#[derive(Clone)]
struct AuthFailure {
    status: StatusCode,
    message: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(identity) = parts.extensions.get::<Identity>() {
            return Ok(Authenticated(identity.clone()));
        }

        if let Some(failure) = parts.extensions.get::<AuthFailure>() {
            return Err(AuthRejection {
                status: failure.status,
                message: failure.message.clone(),
            });
        }

        // The layer stores AppState on every request it sees; its absence
        // means the route is missing the layer entirely.
        if parts.extensions.get::<AppState>().is_none() {
            return Err(AuthRejection {
                status: StatusCode::INTERNAL_SERVER_ERROR,
                message: "Auth service not configured".to_string(),
            });
        }

        Err(AuthRejection {
            status: StatusCode::UNAUTHORIZED,
            message: "Missing authentication token".to_string(),
        })
    }
}

/// Client address extractor
///
/// Reverse proxies put the real address in a header, so headers win over
/// the socket address. `x-real-ip` is taken whole; `x-forwarded-for`
/// grows one entry per proxy hop, so only the first entry counts. The
/// value keys rate-limit counters and is treated as an opaque string.
pub struct ClientIp(pub String);

#[async_trait]
impl<S> FromRequestParts<S> for ClientIp
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        if let Some(value) = parts.headers.get("x-real-ip").and_then(|v| v.to_str().ok()) {
            let value = value.trim();
            if !value.is_empty() {
                return Ok(ClientIp(value.to_string()));
            }
        }

        if let Some(value) = parts
            .headers
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
        {
            if let Some(first) = value.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return Ok(ClientIp(first.to_string()));
                }
            }
        }

        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|info| info.0.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        Ok(ClientIp(ip))
    }
}

/// Middleware layer that validates bearer tokens ahead of the handler
/// and appends rotated tokens to the response
#[derive(Clone)]
pub struct AuthLayer {
    state: AppState,
}

impl AuthLayer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }
}

impl<S> Layer<S> for AuthLayer {
    type Service = AuthMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        AuthMiddleware {
            inner,
            state: self.state.clone(),
        }
    }
}

#[derive(Clone)]
pub struct AuthMiddleware<S> {
    inner: S,
    state: AppState,
}

impl<S, B> Service<axum::http::Request<B>> for AuthMiddleware<S>
where
    S: Service<axum::http::Request<B>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
    B: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: axum::http::Request<B>) -> Self::Future {
        let state = self.state.clone();
        // Take the service that was polled ready; leave the clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let token = req
                .headers()
                .get(AUTHORIZATION)
                .and_then(|v| v.to_str().ok())
                .and_then(extract_bearer_token)
                .map(String::from);

            let mut rotation: Option<Rotation> = None;

            if let Some(token) = token {
                match state.strategy.validate(&token).await {
                    Ok(identity) => {
                        if !identity.rotation.is_empty() {
                            rotation = Some(identity.rotation.clone());
                        }
                        req.extensions_mut().insert(identity);
                    }
                    Err(e) => {
                        let (status, _) = e.status_and_code();
                        req.extensions_mut().insert(AuthFailure {
                            status,
                            message: e.public_message(),
                        });
                    }
                }
            }

            req.extensions_mut().insert(state);

            let mut response = inner.call(req).await?;

            if let Some(rotation) = rotation {
                append_rotation_headers(response.headers_mut(), &rotation);
            }

            Ok(response)
        })
    }
}

/// Rotated tokens travel in response headers, never in the body.
fn append_rotation_headers(headers: &mut HeaderMap, rotation: &Rotation) {
    if let Some(token) = &rotation.access_token {
        match HeaderValue::from_str(token) {
            Ok(value) => {
                headers.insert(ACCESS_TOKEN_HEADER, value);
            }
            Err(e) => warn!(error = %e, "rotated access token is not header-safe"),
        }
    }
    if let Some(token) = &rotation.refresh_token {
        match HeaderValue::from_str(token) {
            Ok(value) => {
                headers.insert(REFRESH_TOKEN_HEADER, value);
            }
            Err(e) => warn!(error = %e, "rotated refresh token is not header-safe"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::get;
    use axum::Router;
    use tower::ServiceExt;

    use crate::auth::token_service::TokenService;
    use crate::auth::token_strategy::TokenStrategy;
    use crate::config::TokenLifetimes;
    use crate::user::entity::User;

    async fn whoami(auth: Authenticated) -> String {
        auth.user.username.clone()
    }

    async fn client_ip(ip: ClientIp) -> String {
        ip.0
    }

    fn app(tokens: Arc<TokenService>) -> Router {
        let strategy: Arc<dyn AuthStrategy> = Arc::new(TokenStrategy::new(tokens));
        Router::new()
            .route("/me", get(whoami))
            .layer(AuthLayer::new(AppState { strategy }))
    }

    fn tokens() -> Arc<TokenService> {
        Arc::new(TokenService::new("test-key", TokenLifetimes::default()))
    }

    #[tokio::test]
    async fn test_valid_token_reaches_handler() {
        let tokens = tokens();
        let user = User::new("alice", "digest");
        let token = tokens
            .issue_user_token(&user, chrono::Duration::minutes(10))
            .unwrap();

        let response = app(tokens)
            .oneshot(
                Request::builder()
                    .uri("/me")
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_missing_token_rejected() {
        let response = app(tokens())
            .oneshot(Request::builder().uri("/me").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_expired_token_rejected() {
        let tokens = tokens();
        let user = User::new("bob", "digest");
        let token = tokens
            .issue_user_token(&user, chrono::Duration::seconds(-120))
            .unwrap();

        let response = app(tokens)
            .oneshot(
                Request::builder()
                    .uri("/me")
                    .header("Authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_garbage_token_rejected() {
        let response = app(tokens())
            .oneshot(
                Request::builder()
                    .uri("/me")
                    .header("Authorization", "Bearer not-a-token")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_client_ip_prefers_proxy_headers() {
        let app = Router::new().route("/ip", get(client_ip));

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/ip")
                    .header("x-real-ip", "203.0.113.9")
                    .header("x-forwarded-for", "198.51.100.2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"203.0.113.9");

        // Without headers or connect info the address is opaque.
        let response = app
            .oneshot(Request::builder().uri("/ip").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"unknown");
    }

    #[tokio::test]
    async fn test_forwarded_for_takes_first_hop() {
        let app = Router::new().route("/ip", get(client_ip));

        // A multi-hop chain keys the caller, not the proxy path.
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ip")
                    .header("x-forwarded-for", "203.0.113.9, 198.51.100.4, 10.0.0.1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"203.0.113.9");
    }
}
