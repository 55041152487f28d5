//! Authentication Aggregate
//!
//! Strategies, token issuance, password hashing, and the login pipeline.

// Strategy engine
pub mod strategy;
pub mod token_strategy;
pub mod session_strategy;
pub mod refresh_strategy;

// Services
pub mod token_service;
pub mod password_service;
pub mod login_service;

// API
pub mod login_api;

// Re-export main types
pub use login_api::{login_router, LoginApiState, LoginRequest, LoginResponse};
pub use login_service::LoginService;
pub use password_service::{Argon2Config, PasswordPolicy, PasswordService};
pub use strategy::{create_strategy, AuthStrategy, Identity, IssuedTokens, Rotation};
pub use token_service::{Claims, ExchangeClaims, TokenService, TokenUser};
