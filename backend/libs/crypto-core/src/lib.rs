//! Shared cryptographic primitives for the auth service
//!
//! - [`hash`]: Argon2id password hashing with constant-time verification
//! - [`jwt`]: versioned signing keys and the compact token codec

pub mod hash;
pub mod jwt;

pub use hash::{hash_password, verify_password, Credential, HashError, HashParams, ARGON2ID};
pub use jwt::{Claims, JwtError, KeyRing, SigningKey, JWT_ALGORITHM};
