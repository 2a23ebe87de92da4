/// HTTP request handlers (REST API)
pub mod admin;
pub mod auth;

// Re-export handlers for easy access
pub use auth::{
    bearer_token, change_password, login, logout, register, verify, LoginResponse,
    MessageResponse, RegisterResponse, VerifyResponse,
};
