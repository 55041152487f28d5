//! Turnkey Authentication
//!
//! Core authentication service providing:
//! - Username/password login behind three interchangeable strategies
//!   (stateless token, server-side session, rotating refresh)
//! - Sliding-window lockout against brute-force logins
//! - Social login bridge for github, google, bitbucket, and weixin
//! - Registration, profile, and password-change endpoints
//!
//! ## Module Organization (Aggregate-based)
//!
//! Each aggregate contains:
//! - `entity` - Domain entities
//! - `repository` - Data access
//! - `api` - REST endpoints
//! - service files where the aggregate carries behavior

// Core aggregates
pub mod user;
pub mod session;
pub mod attempt;

// Authentication engine and social bridge
pub mod auth;
pub mod social;

// Shared infrastructure
pub mod shared;
pub mod config;

// Cross-cutting concerns
pub mod seed;

// Re-export common types from shared
pub use shared::error::{AuthError, ErrorResponse, Result};
pub use shared::tsid::TsidGenerator;

// Re-export main entity types for convenience
pub use attempt::entity::AuthAttempt;
pub use session::entity::Session;
pub use user::entity::{User, UserRole};

// Re-export repositories
pub use attempt::repository::AttemptRepository;
pub use session::repository::SessionRepository;
pub use user::repository::UserRepository;

// Re-export configuration
pub use config::{
    AbusePolicy, AuthSettings, ProviderRegistry, ProviderSettings, StrategyKind, TokenLifetimes,
};

// Re-export services and strategy engine
pub use attempt::detector::AbuseDetector;
pub use auth::login_service::LoginService;
pub use auth::password_service::{Argon2Config, PasswordPolicy, PasswordService};
pub use auth::strategy::{create_strategy, AuthStrategy, Identity, IssuedTokens};
pub use auth::token_service::{TokenService, TokenUser};
pub use social::service::SocialLoginService;

// Re-export API states, routers, and middleware
pub use auth::login_api::{login_router, LoginApiState};
pub use seed::DevDataSeeder;
pub use shared::indexes::initialize_indexes;
pub use shared::middleware::{
    AppState, AuthLayer, Authenticated, ClientIp, ACCESS_TOKEN_HEADER, REFRESH_TOKEN_HEADER,
};
pub use social::api::{social_router, SocialApiState};
pub use user::api::{user_router, UsersState};
