use chrono::{DateTime, Duration, TimeZone, Utc};
use crypto_core::{Credential, HashParams, KeyRing};
use std::future::Future;
use std::sync::Arc;

use super::lockout::{FailureWindow, LockoutPolicy, LockoutTracker};
use crate::db::{CredentialStore, StoreError};
use crate::error::{AuthError, Result};
use crate::metrics;
use crate::models::{IssuedToken, Principal};
use crate::security::{
    hash_blocking, verify_blocking, PasswordPolicy, RevocationRegistry, TokenIssuer,
    TokenVerifier,
};
use crate::validators::validate_identifier;

/// Tunables for the auth engine
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub token_ttl: Duration,
    pub hash_params: HashParams,
    pub lockout: LockoutPolicy,
    pub password_policy: PasswordPolicy,
    /// Upper bound on every credential store call
    pub store_timeout: std::time::Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            token_ttl: Duration::hours(1),
            hash_params: HashParams::default(),
            lockout: LockoutPolicy::default(),
            password_policy: PasswordPolicy::default(),
            store_timeout: std::time::Duration::from_secs(2),
        }
    }
}

/// Registration, login and token lifecycle over a credential store
///
/// Every operation takes the current instant explicitly so the engine itself
/// never reads the clock.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    issuer: TokenIssuer,
    verifier: TokenVerifier,
    revocations: Arc<RevocationRegistry>,
    lockout: Arc<LockoutTracker>,
    password_policy: PasswordPolicy,
    hash_params: HashParams,
    store_timeout: std::time::Duration,
    /// Verified against when the principal does not exist, so unknown
    /// identifiers cost the same as a wrong password
    dummy_credential: Credential,
}

/// Revocation cutoffs share the token's millisecond precision
fn truncate_to_millis(instant: DateTime<Utc>) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(instant.timestamp_millis())
        .single()
        .unwrap_or(instant)
}

impl AuthService {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        keys: Arc<KeyRing>,
        revocations: Arc<RevocationRegistry>,
        settings: EngineSettings,
    ) -> Result<Self> {
        if settings.lockout.threshold == 0 || settings.lockout.window <= Duration::zero() {
            return Err(AuthError::Validation(
                "lockout threshold and window must be positive".to_string(),
            ));
        }

        let issuer = TokenIssuer::new(Arc::clone(&keys), settings.token_ttl)?;
        let verifier = TokenVerifier::new(keys, Arc::clone(&revocations));
        let dummy_credential = crypto_core::hash_password(
            &uuid::Uuid::new_v4().to_string(),
            &settings.hash_params,
        )?;

        Ok(Self {
            store,
            issuer,
            verifier,
            revocations,
            lockout: Arc::new(LockoutTracker::new(settings.lockout)),
            password_policy: settings.password_policy,
            hash_params: settings.hash_params,
            store_timeout: settings.store_timeout,
            dummy_credential,
        })
    }

    pub fn revocations(&self) -> Arc<RevocationRegistry> {
        Arc::clone(&self.revocations)
    }

    pub fn lockout(&self) -> Arc<LockoutTracker> {
        Arc::clone(&self.lockout)
    }

    /// Create an active principal with a freshly hashed credential
    #[tracing::instrument(skip(self, password, now), fields(state = "received"))]
    pub async fn register(&self, identifier: &str, password: &str, now: DateTime<Utc>) -> Result<()> {
        metrics::inc_register_requests();

        if !validate_identifier(identifier) {
            return Err(AuthError::Validation(
                "identifier must be 1-254 characters without whitespace".to_string(),
            ));
        }
        self.password_policy.check(password)?;
        tracing::Span::current().record("state", "validated");

        if self.store_call(self.store.get(identifier)).await?.is_some() {
            tracing::Span::current().record("state", "rejected");
            return Err(AuthError::DuplicateIdentifier);
        }

        let credential = hash_blocking(password.to_string(), self.hash_params).await?;
        self.store_call(
            self.store
                .put(Principal::new(identifier.to_string(), credential, now)),
        )
        .await?;

        tracing::Span::current().record("state", "authenticated");
        tracing::info!(identifier = %identifier, "Principal registered");
        Ok(())
    }

    /// Authenticate and issue a session token
    #[tracing::instrument(skip(self, password, now), fields(state = "received"))]
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedToken> {
        metrics::inc_login_requests();

        let mut window = self.lockout.acquire(identifier).await;
        let result = self
            .authenticate(identifier, password, &mut window, now)
            .await;

        let principal = match result {
            Ok(principal) => principal,
            Err(err) => {
                tracing::Span::current().record("state", "rejected");
                return Err(err);
            }
        };

        let token = self.issuer.issue(&principal.id, now)?;
        tracing::Span::current().record("state", "authenticated");
        tracing::info!(
            identifier = %identifier,
            token_id = %token.token_id,
            "Login succeeded"
        );
        Ok(token)
    }

    /// Verify a session token and return its principal id
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<String> {
        let result = self.verifier.verify(token, now);
        match &result {
            Ok(_) => metrics::inc_token_verifications("ok"),
            Err(err) => metrics::inc_token_verifications(err.code()),
        }
        result
    }

    /// Revoke the presented token until its natural expiry
    #[tracing::instrument(skip_all)]
    pub async fn logout(&self, token: &str, now: DateTime<Utc>) -> Result<()> {
        let verified = self.verifier.verify_claims(token, now)?;
        self.revocations
            .revoke(&verified.token_id, verified.expires_at, now);
        metrics::inc_token_revocations("token");
        tracing::info!(
            identifier = %verified.subject,
            token_id = %verified.token_id,
            "Logged out"
        );
        Ok(())
    }

    /// Rotate the credential after re-authenticating with the current one
    ///
    /// Every token issued before the rotation is revoked.
    #[tracing::instrument(skip(self, current_password, new_password, now))]
    pub async fn change_password(
        &self,
        identifier: &str,
        current_password: &str,
        new_password: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut window = self.lockout.acquire(identifier).await;
        let principal = self
            .authenticate(identifier, current_password, &mut window, now)
            .await?;

        self.password_policy.check(new_password)?;

        let credential = hash_blocking(new_password.to_string(), self.hash_params).await?;
        self.store_call(self.store.replace_credential(&principal.id, credential))
            .await?;

        self.revoke_principal_tokens(&principal.id, now);
        tracing::info!(identifier = %identifier, "Password changed");
        Ok(())
    }

    /// Revoke every outstanding token of a principal
    #[tracing::instrument(skip(self, now))]
    pub async fn revoke_all(&self, identifier: &str, now: DateTime<Utc>) -> Result<()> {
        if self.store_call(self.store.get(identifier)).await?.is_none() {
            return Err(AuthError::UnknownPrincipal);
        }
        self.revoke_principal_tokens(identifier, now);
        Ok(())
    }

    /// Restore a locked principal and forget its recent failures
    #[tracing::instrument(skip(self))]
    pub async fn unlock(&self, identifier: &str) -> Result<()> {
        let mut window = self.lockout.acquire(identifier).await;
        self.store_call(self.store.update_lock_state(identifier, false))
            .await?;
        window.reset();
        tracing::info!(identifier = %identifier, "Principal unlocked");
        Ok(())
    }

    /// Soft-delete a principal and revoke its tokens
    ///
    /// The identifier stays reserved.
    #[tracing::instrument(skip(self, now))]
    pub async fn deactivate(&self, identifier: &str, now: DateTime<Utc>) -> Result<()> {
        let mut window = self.lockout.acquire(identifier).await;
        self.store_call(self.store.deactivate(identifier)).await?;
        window.reset();
        self.revoke_principal_tokens(identifier, now);
        tracing::warn!(identifier = %identifier, "Principal deactivated");
        Ok(())
    }

    /// Shared credential check for login and password rotation
    ///
    /// The caller holds the identifier's failure window for the whole call.
    async fn authenticate(
        &self,
        identifier: &str,
        password: &str,
        window: &mut FailureWindow,
        now: DateTime<Utc>,
    ) -> Result<Principal> {
        let principal = match self.store_call(self.store.get(identifier)).await? {
            Some(principal) if !principal.is_deactivated() => principal,
            _ => {
                if window.is_locked() {
                    return Err(AuthError::AccountLocked);
                }
                // Burn the same work as a real verification
                verify_blocking(password.to_string(), self.dummy_credential.clone()).await?;
                metrics::inc_login_failures();
                // Lock on the same attempt a real principal would
                if window.record_failure(now, self.lockout.policy()) {
                    window.lock();
                    tracing::debug!(identifier = %identifier, "Unknown identifier locked");
                    return Err(AuthError::AccountLocked);
                }
                return Err(AuthError::UnknownPrincipal);
            }
        };

        if principal.is_locked() {
            return Err(AuthError::AccountLocked);
        }

        if verify_blocking(password.to_string(), principal.credential.clone()).await? {
            window.reset();
            return Ok(principal);
        }

        metrics::inc_login_failures();
        if window.record_failure(now, self.lockout.policy()) {
            self.store_call(self.store.update_lock_state(identifier, true))
                .await?;
            window.reset();
            metrics::inc_account_lockouts();
            tracing::warn!(identifier = %identifier, "Account locked after repeated failures");
            return Err(AuthError::AccountLocked);
        }

        Err(AuthError::InvalidCredential)
    }

    fn revoke_principal_tokens(&self, identifier: &str, now: DateTime<Utc>) {
        self.revocations.revoke_principal(
            identifier,
            truncate_to_millis(now),
            now + self.issuer.ttl(),
        );
        metrics::inc_token_revocations("principal");
    }

    /// Bound a store call by the configured timeout
    async fn store_call<T, F>(&self, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => result.map_err(AuthError::from),
            Err(_) => {
                tracing::warn!(timeout = ?self.store_timeout, "Credential store call timed out");
                Err(AuthError::StoreUnavailable(format!(
                    "store call exceeded {:?}",
                    self.store_timeout
                )))
            }
        }
    }
}
