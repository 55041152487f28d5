//! Turnkey Auth Server
//!
//! Production server for the authentication REST APIs:
//! - Login/logout under the configured strategy (token, session, refresh)
//! - Registration, current user, password change
//! - Social login bridge (github, google, bitbucket, weixin)
//! - Swagger UI and a separate metrics/health listener
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TK_API_PORT` | `3000` | HTTP API port |
//! | `TK_METRICS_PORT` | `9090` | Metrics/health port |
//! | `TK_MONGO_URL` | `mongodb://localhost:27017` | MongoDB connection URL |
//! | `TK_MONGO_DB` | `turnkey` | MongoDB database name |
//! | `TK_DEV_MODE` | - | `true`/`1` seeds development accounts |
//! | `RUST_LOG` | `info` | Log level |
//!
//! Authentication settings (strategy, signing key, lockout thresholds,
//! provider credentials) are documented in `tk_auth::config`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{http::HeaderName, response::Json, routing::get, Router};
use chrono::Utc;
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

use tk_auth::{
    create_strategy, initialize_indexes, login_router, social_router, user_router, AbuseDetector,
    AppState, AttemptRepository, AuthLayer, AuthSettings, DevDataSeeder, LoginApiState,
    LoginService, PasswordService, SessionRepository, SocialApiState, SocialLoginService,
    TokenService, UserRepository, UsersState, ACCESS_TOKEN_HEADER, REFRESH_TOKEN_HEADER,
};

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[tokio::main]
async fn main() -> Result<()> {
    tk_common::logging::init_logging("tk-auth-server");

    info!("Starting Turnkey Auth Server");

    // Configuration from environment
    let api_port: u16 = env_or_parse("TK_API_PORT", 3000);
    let metrics_port: u16 = env_or_parse("TK_METRICS_PORT", 9090);
    let mongo_url = env_or("TK_MONGO_URL", "mongodb://localhost:27017");
    let mongo_db = env_or("TK_MONGO_DB", "turnkey");

    let settings = AuthSettings::from_env()?;

    // Connect to MongoDB
    info!("Connecting to MongoDB: {}/{}", mongo_url, mongo_db);
    let mongo_client = mongodb::Client::with_uri_str(&mongo_url).await?;
    let db = mongo_client.database(&mongo_db);

    initialize_indexes(&db).await?;

    // Seed development data if in dev mode
    let dev_mode = std::env::var("TK_DEV_MODE")
        .map(|v| v == "true" || v == "1")
        .unwrap_or(false);
    if dev_mode {
        let seeder = DevDataSeeder::new(db.clone());
        if let Err(e) = seeder.seed().await {
            tracing::warn!("Dev data seeding skipped (data may already exist): {}", e);
        }
    }

    // Initialize repositories
    let users = Arc::new(UserRepository::new(&db));
    let sessions = Arc::new(SessionRepository::new(&db));
    let attempts = Arc::new(AttemptRepository::new(&db));
    info!("Repositories initialized");

    // Sweep leftovers from previous runs
    match sessions.delete_expired().await {
        Ok(purged) if purged > 0 => info!(purged, "removed expired sessions"),
        Ok(_) => {}
        Err(e) => tracing::warn!("Session sweep failed: {}", e),
    }
    match attempts
        .delete_before(settings.abuse.window_start(Utc::now()))
        .await
    {
        Ok(purged) if purged > 0 => info!(purged, "removed login attempts outside the window"),
        Ok(_) => {}
        Err(e) => tracing::warn!("Attempt sweep failed: {}", e),
    }

    // Initialize services
    let passwords = Arc::new(PasswordService::default());
    let tokens = Arc::new(TokenService::new(&settings.signing_key, settings.lifetimes));
    let strategy = create_strategy(
        settings.strategy,
        tokens.clone(),
        sessions.clone(),
        users.clone(),
    );
    let detector = Arc::new(AbuseDetector::new(attempts.clone(), settings.abuse));
    let login_service = Arc::new(LoginService::new(
        users.clone(),
        passwords.clone(),
        detector,
        strategy.clone(),
    ));
    let social_service = Arc::new(SocialLoginService::new(
        users.clone(),
        passwords.clone(),
        tokens.clone(),
        strategy.clone(),
    ));
    info!("Auth services initialized (strategy: {})", settings.strategy);

    // Create AppState for the auth middleware
    let app_state = AppState { strategy };

    // Build API states
    let login_state = LoginApiState {
        login_service,
        sessions: sessions.clone(),
    };
    let users_state = UsersState {
        users,
        passwords,
        sessions,
    };
    let social_state = SocialApiState {
        social_service,
        providers: settings.providers.clone(),
        client_url: settings.client_url.clone(),
        external_base_url: settings.external_base_url.clone(),
    };

    // Build the JSON API router using OpenApiRouter for auto-collected OpenAPI paths
    let (router, mut openapi) = OpenApiRouter::new()
        .merge(login_router(login_state))
        .merge(user_router(users_state))
        .split_for_parts();

    // Update OpenAPI info
    openapi.info.title = "Turnkey Auth API".to_string();
    openapi.info.version = "1.0.0".to_string();
    openapi.info.description =
        Some("Authentication REST APIs: login, registration, and social login".to_string());

    // Rotated tokens ride response headers; browsers only see exposed headers.
    let expose_headers = [
        HeaderName::from_bytes(ACCESS_TOKEN_HEADER.as_bytes())?,
        HeaderName::from_bytes(REFRESH_TOKEN_HEADER.as_bytes())?,
    ];

    // Add the browser-redirect social routes (plain Router, not collected in OpenAPI)
    let app = Router::new()
        .merge(router)
        .merge(social_router(social_state))
        // OpenAPI / Swagger UI with auto-collected paths
        .merge(SwaggerUi::new("/swagger-ui").url("/q/openapi", openapi))
        // Auth middleware
        .layer(AuthLayer::new(app_state))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
                .expose_headers(expose_headers),
        );

    // Start API server
    let api_addr = format!("0.0.0.0:{}", api_port);
    info!("API server listening on http://{}", api_addr);

    let api_listener = TcpListener::bind(&api_addr).await?;
    let api_task = tokio::spawn(async move {
        axum::serve(
            api_listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    // Start metrics server
    let metrics_addr = format!("0.0.0.0:{}", metrics_port);
    info!("Metrics server listening on http://{}/metrics", metrics_addr);

    let metrics_app = Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/ready", get(ready_handler));

    let metrics_listener = TcpListener::bind(&metrics_addr).await?;
    let metrics_task = tokio::spawn(async move {
        axum::serve(metrics_listener, metrics_app).await.unwrap();
    });

    info!("Turnkey Auth Server started");
    info!("Press Ctrl+C to shutdown");

    // Wait for shutdown
    shutdown_signal().await;
    info!("Shutdown signal received...");

    api_task.abort();
    metrics_task.abort();

    info!("Turnkey Auth Server shutdown complete");
    Ok(())
}

async fn metrics_handler() -> &'static str {
    "# HELP tk_auth_up Auth service is up\n# TYPE tk_auth_up gauge\ntk_auth_up 1\n"
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "UP",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn ready_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "READY"
    }))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
