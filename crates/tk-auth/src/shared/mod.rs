//! Shared Module
//!
//! Cross-cutting concerns and shared utilities.

pub mod error;
pub mod tsid;
pub mod middleware;
pub mod indexes;

// Re-export commonly used items
pub use error::{AuthError, ErrorResponse, Result};
pub use indexes::initialize_indexes;
pub use middleware::{AppState, AuthLayer, Authenticated, ClientIp};
pub use tsid::TsidGenerator;
