use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use crypto_core::{HashError, JwtError};
use serde_json::json;
use thiserror::Error;

use crate::db::StoreError;

#[derive(Debug, Error)]
pub enum AuthError {
    // Token errors
    #[error("Malformed token")]
    Malformed,

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token expired")]
    Expired,

    #[error("Token revoked")]
    Revoked,

    // Authentication errors
    #[error("Identifier already registered")]
    DuplicateIdentifier,

    #[error("Password too weak: {0}")]
    WeakCredential(String),

    #[error("Unknown principal")]
    UnknownPrincipal,

    #[error("Account locked")]
    AccountLocked,

    #[error("Invalid credentials")]
    InvalidCredential,

    #[error("Stored credential has an unsupported format")]
    InvalidCredentialFormat,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden")]
    Forbidden,

    // Infrastructure errors
    #[error("Credential store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
pub type AuthResult<T> = Result<T>;

impl AuthError {
    /// Only infrastructure failures are worth retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, AuthError::StoreUnavailable(_))
    }

    /// Stable machine-readable code for the wire
    ///
    /// `UnknownPrincipal` and `InvalidCredential` share a code so callers
    /// cannot probe which identifiers exist.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::Malformed => "malformed_token",
            AuthError::InvalidSignature => "invalid_signature",
            AuthError::Expired => "token_expired",
            AuthError::Revoked => "token_revoked",
            AuthError::DuplicateIdentifier => "duplicate_identifier",
            AuthError::WeakCredential(_) => "weak_credential",
            AuthError::UnknownPrincipal | AuthError::InvalidCredential => "invalid_credentials",
            AuthError::AccountLocked => "account_locked",
            AuthError::Validation(_) => "validation_error",
            AuthError::Forbidden => "forbidden",
            AuthError::StoreUnavailable(_) => "service_unavailable",
            AuthError::InvalidCredentialFormat | AuthError::Internal(_) => "internal_error",
        }
    }

    /// Message safe to show to the caller
    pub fn public_message(&self) -> String {
        match self {
            AuthError::UnknownPrincipal | AuthError::InvalidCredential => {
                "Invalid credentials".to_string()
            }
            AuthError::WeakCredential(reason) => format!("Password too weak: {}", reason),
            AuthError::Validation(msg) => msg.clone(),
            AuthError::StoreUnavailable(_) => {
                "Service temporarily unavailable, retry later".to_string()
            }
            AuthError::InvalidCredentialFormat | AuthError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::Malformed
            | AuthError::InvalidSignature
            | AuthError::Expired
            | AuthError::Revoked
            | AuthError::UnknownPrincipal
            | AuthError::InvalidCredential => StatusCode::UNAUTHORIZED,
            AuthError::DuplicateIdentifier => StatusCode::CONFLICT,
            AuthError::WeakCredential(_) | AuthError::Validation(_) => StatusCode::BAD_REQUEST,
            AuthError::AccountLocked => StatusCode::LOCKED,
            AuthError::Forbidden => StatusCode::FORBIDDEN,
            AuthError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AuthError::InvalidCredentialFormat | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.code(),
            "message": self.public_message(),
            "status": status.as_u16()
        }));

        if self.is_retryable() {
            (status, [(header::RETRY_AFTER, "1")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => AuthError::UnknownPrincipal,
            StoreError::Conflict => AuthError::DuplicateIdentifier,
            StoreError::Unavailable(msg) => AuthError::StoreUnavailable(msg),
            StoreError::Corrupt(msg) => AuthError::Internal(format!("corrupt principal record: {}", msg)),
        }
    }
}

impl From<HashError> for AuthError {
    fn from(err: HashError) -> Self {
        match err {
            HashError::InvalidCredentialFormat(_) => AuthError::InvalidCredentialFormat,
            HashError::InvalidParams(msg) | HashError::Hashing(msg) => AuthError::Internal(msg),
        }
    }
}

impl From<JwtError> for AuthError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Malformed => AuthError::Malformed,
            JwtError::InvalidSignature | JwtError::UnknownKeyVersion(_) => {
                AuthError::InvalidSignature
            }
            other => AuthError::Internal(other.to_string()),
        }
    }
}
