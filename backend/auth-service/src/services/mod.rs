/// Business logic services
pub mod auth_service;
pub mod lockout;

pub use auth_service::{AuthService, EngineSettings};
pub use lockout::{FailureWindow, LockoutPolicy, LockoutTracker};
