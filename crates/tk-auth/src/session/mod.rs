//! Session Aggregate
//!
//! Server-side sessions backing the Session and Refresh strategies.

pub mod entity;
pub mod repository;

// Re-export main types
pub use entity::Session;
pub use repository::SessionRepository;
