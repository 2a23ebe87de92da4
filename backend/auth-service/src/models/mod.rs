/// Data models for authentication
pub mod principal;
pub mod token;
pub mod token_revocation;

pub use principal::{
    ChangePasswordRequest, LoginRequest, Principal, PrincipalStatus, RegisterRequest,
};
pub use token::{IssuedToken, VerifiedToken};
pub use token_revocation::RevocationEntry;
