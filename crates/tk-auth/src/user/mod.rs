//! User Aggregate
//!
//! Account records and the registration/profile endpoints.

pub mod entity;
pub mod repository;
pub mod api;

// Re-export main types
pub use entity::{User, UserRole};
pub use repository::UserRepository;
pub use api::{user_router, UserResponse, UsersState};
