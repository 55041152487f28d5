//! Social Login Aggregate
//!
//! The bridge from external OAuth providers into normal token issuance.

pub mod provider;
pub mod provider_client;
pub mod service;
pub mod api;

// Re-export main types
pub use api::{social_router, SocialApiState};
pub use provider::{SocialProfile, SocialProvider};
pub use provider_client::{ProviderClient, ProviderToken};
pub use service::SocialLoginService;
