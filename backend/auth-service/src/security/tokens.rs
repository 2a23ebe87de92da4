/// Session token issuance and verification
use chrono::{DateTime, Duration, TimeZone, Utc};
use crypto_core::{Claims, KeyRing};
use std::sync::Arc;
use uuid::Uuid;

use super::token_revocation::RevocationRegistry;
use crate::error::{AuthError, AuthResult};
use crate::models::{IssuedToken, VerifiedToken};

fn from_millis(ms: i64) -> AuthResult<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms)
        .single()
        .ok_or(AuthError::Malformed)
}

/// Creates signed, time-bounded tokens with the ring's current key
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    keys: Arc<KeyRing>,
    ttl: Duration,
}

impl TokenIssuer {
    pub fn new(keys: Arc<KeyRing>, ttl: Duration) -> AuthResult<Self> {
        if ttl <= Duration::zero() {
            return Err(AuthError::Validation(
                "token ttl must be positive".to_string(),
            ));
        }
        Ok(Self { keys, ttl })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn issue(&self, principal_id: &str, now: DateTime<Utc>) -> AuthResult<IssuedToken> {
        let expires_at = now + self.ttl;
        let claims = Claims {
            sub: principal_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat_ms: now.timestamp_millis(),
            exp_ms: expires_at.timestamp_millis(),
        };

        let (token, key_version) = crypto_core::jwt::sign(&claims, &self.keys)?;

        tracing::debug!(
            token_id = %claims.jti,
            key_version,
            "Issued session token"
        );

        Ok(IssuedToken {
            token,
            token_id: claims.jti,
            subject: claims.sub,
            issued_at: from_millis(claims.iat_ms)?,
            expires_at: from_millis(claims.exp_ms)?,
            key_version,
        })
    }
}

/// Validates structure, signature, expiry and revocation status, in that order
///
/// Holds no mutable state of its own, so one instance is shared by every request.
#[derive(Debug, Clone)]
pub struct TokenVerifier {
    keys: Arc<KeyRing>,
    revocations: Arc<RevocationRegistry>,
}

impl TokenVerifier {
    pub fn new(keys: Arc<KeyRing>, revocations: Arc<RevocationRegistry>) -> Self {
        Self { keys, revocations }
    }

    /// Verify and return the subject
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> AuthResult<String> {
        self.verify_claims(token, now).map(|verified| verified.subject)
    }

    /// Verify and return every verified claim
    pub fn verify_claims(&self, token: &str, now: DateTime<Utc>) -> AuthResult<VerifiedToken> {
        let (key_version, claims) = crypto_core::jwt::decode_verified(token, &self.keys)?;

        if now.timestamp_millis() >= claims.exp_ms {
            return Err(AuthError::Expired);
        }

        let issued_at = from_millis(claims.iat_ms)?;
        if self
            .revocations
            .is_revoked(&claims.jti, &claims.sub, issued_at, now)
        {
            return Err(AuthError::Revoked);
        }

        Ok(VerifiedToken {
            token_id: claims.jti,
            subject: claims.sub,
            issued_at,
            expires_at: from_millis(claims.exp_ms)?,
            key_version,
        })
    }
}
