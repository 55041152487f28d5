//! Login Attempt Aggregate
//!
//! Append-only ledger of failed logins and the lockout decision built
//! on top of it.

pub mod entity;
pub mod repository;
pub mod detector;

// Re-export main types
pub use detector::AbuseDetector;
pub use entity::AuthAttempt;
pub use repository::AttemptRepository;
