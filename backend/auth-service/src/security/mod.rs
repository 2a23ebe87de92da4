/// Security module for authentication
/// Provides the password policy, session token lifecycle and revocation tracking

pub mod password;
pub mod token_revocation;
pub mod tokens;

pub use password::{hash_blocking, verify_blocking, PasswordPolicy};
pub use token_revocation::RevocationRegistry;
pub use tokens::{TokenIssuer, TokenVerifier};
