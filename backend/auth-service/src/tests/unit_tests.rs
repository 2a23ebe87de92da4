/// Unit tests for the auth engine (no database required)
///
/// These tests drive `AuthService` over the in-memory store, a mocked store for
/// infrastructure failures, and a deliberately slow store for timeouts.
use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::db::{MockCredentialStore, StoreError};
use crate::error::AuthError;
use crate::models::PrincipalStatus;
use crate::tests::fixtures::*;

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_then_login() {
    // GIVEN: A registered principal
    let (engine, store) = memory_engine(5);
    let now = Utc::now();
    engine
        .register(TEST_IDENTIFIER, TEST_PASSWORD, now)
        .await
        .unwrap();

    // WHEN: It logs in with the right password
    let issued = engine.login(TEST_IDENTIFIER, TEST_PASSWORD, now).await.unwrap();

    // THEN: The token verifies to the principal
    assert_eq!(issued.subject, TEST_IDENTIFIER);
    assert_eq!(engine.verify(&issued.token, now).unwrap(), TEST_IDENTIFIER);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_duplicate_register_leaves_state_unchanged() {
    // GIVEN: alice is registered
    let (engine, store) = memory_engine(5);
    let now = Utc::now();
    engine
        .register(TEST_IDENTIFIER, TEST_PASSWORD, now)
        .await
        .unwrap();
    let original = stored(&store, TEST_IDENTIFIER).await;

    // WHEN: Someone registers alice again with another password
    let result = engine.register(TEST_IDENTIFIER, NEW_PASSWORD, now).await;

    // THEN: DuplicateIdentifier, and the stored credential is untouched
    assert!(matches!(result, Err(AuthError::DuplicateIdentifier)));
    assert_eq!(store.len(), 1);
    assert_eq!(
        stored(&store, TEST_IDENTIFIER).await.credential,
        original.credential
    );
    assert!(engine.login(TEST_IDENTIFIER, TEST_PASSWORD, now).await.is_ok());
}

#[tokio::test]
async fn test_register_weak_passwords_rejected() {
    let (engine, store) = memory_engine(5);
    for weak in weak_passwords() {
        let result = engine.register(TEST_IDENTIFIER, weak, Utc::now()).await;
        assert!(
            matches!(result, Err(AuthError::WeakCredential(_))),
            "{weak:?} should be rejected"
        );
    }
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_register_invalid_identifiers_rejected() {
    let (engine, store) = memory_engine(5);
    for identifier in invalid_identifiers() {
        let result = engine.register(&identifier, TEST_PASSWORD, Utc::now()).await;
        assert!(matches!(result, Err(AuthError::Validation(_))));
    }
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_register_race_conflict_maps_to_duplicate() {
    // GIVEN: A store that reports the identifier free, then loses the insert race
    let mut store = MockCredentialStore::new();
    store.expect_get().returning(|_| Ok(None));
    store.expect_put().returning(|_| Err(StoreError::Conflict));
    let engine = engine_with_store(Arc::new(store), 5);

    // WHEN/THEN: The conflict surfaces as a duplicate
    let result = engine
        .register(TEST_IDENTIFIER, TEST_PASSWORD, Utc::now())
        .await;
    assert!(matches!(result, Err(AuthError::DuplicateIdentifier)));
}

// ============================================================================
// Login and lockout
// ============================================================================

#[tokio::test]
async fn test_login_unknown_principal() {
    let (engine, _) = memory_engine(5);
    let result = engine.login("nobody", TEST_PASSWORD, Utc::now()).await;
    assert!(matches!(result, Err(AuthError::UnknownPrincipal)));
}

#[tokio::test]
async fn test_login_wrong_password() {
    let (engine, _) = memory_engine(5);
    let now = Utc::now();
    engine
        .register(TEST_IDENTIFIER, TEST_PASSWORD, now)
        .await
        .unwrap();

    let result = engine.login(TEST_IDENTIFIER, WRONG_PASSWORD, now).await;
    assert!(matches!(result, Err(AuthError::InvalidCredential)));
}

#[tokio::test]
async fn test_lockout_scenario() {
    // GIVEN: Lockout threshold N = 3
    let (engine, store) = memory_engine(3);
    let now = Utc::now();
    engine
        .register(TEST_IDENTIFIER, TEST_PASSWORD, now)
        .await
        .unwrap();

    // WHEN: Three wrong passwords in a row
    let first = engine.login(TEST_IDENTIFIER, WRONG_PASSWORD, now).await;
    let second = engine
        .login(TEST_IDENTIFIER, WRONG_PASSWORD, now + Duration::seconds(1))
        .await;
    let third = engine
        .login(TEST_IDENTIFIER, WRONG_PASSWORD, now + Duration::seconds(2))
        .await;

    // THEN: The third failure locks the account
    assert!(matches!(first, Err(AuthError::InvalidCredential)));
    assert!(matches!(second, Err(AuthError::InvalidCredential)));
    assert!(matches!(third, Err(AuthError::AccountLocked)));
    assert_eq!(
        stored(&store, TEST_IDENTIFIER).await.status,
        PrincipalStatus::Locked
    );

    // AND: Even the right password is refused until unlock
    let locked = engine
        .login(TEST_IDENTIFIER, TEST_PASSWORD, now + Duration::seconds(3))
        .await;
    assert!(matches!(locked, Err(AuthError::AccountLocked)));

    engine.unlock(TEST_IDENTIFIER).await.unwrap();
    assert!(engine
        .login(TEST_IDENTIFIER, TEST_PASSWORD, now + Duration::seconds(4))
        .await
        .is_ok());
}

#[tokio::test]
async fn test_unknown_identifier_locks_like_real_principal() {
    // GIVEN: Lockout threshold N = 3 and one registered principal
    let (engine, _) = memory_engine(3);
    let now = Utc::now();
    engine
        .register(TEST_IDENTIFIER, TEST_PASSWORD, now)
        .await
        .unwrap();

    // WHEN: The same wrong attempts hit a real and an unknown identifier
    let mut real = Vec::new();
    let mut ghost = Vec::new();
    for attempt in 0..5 {
        let at = now + Duration::seconds(attempt);
        real.push(
            engine
                .login(TEST_IDENTIFIER, WRONG_PASSWORD, at)
                .await
                .unwrap_err()
                .code(),
        );
        ghost.push(
            engine
                .login("ghost", WRONG_PASSWORD, at)
                .await
                .unwrap_err()
                .code(),
        );
    }

    // THEN: Both answer the same sequence, locking on the third attempt
    assert_eq!(real, ghost);
    assert!(matches!(
        engine.login("ghost", TEST_PASSWORD, now + Duration::seconds(6)).await,
        Err(AuthError::AccountLocked)
    ));
}

#[tokio::test]
async fn test_success_resets_failure_count() {
    let (engine, _) = memory_engine(3);
    let now = Utc::now();
    engine
        .register(TEST_IDENTIFIER, TEST_PASSWORD, now)
        .await
        .unwrap();

    for _ in 0..2 {
        let _ = engine.login(TEST_IDENTIFIER, WRONG_PASSWORD, now).await;
    }
    engine.login(TEST_IDENTIFIER, TEST_PASSWORD, now).await.unwrap();

    // Two more failures stay below the threshold after the reset
    for _ in 0..2 {
        let result = engine.login(TEST_IDENTIFIER, WRONG_PASSWORD, now).await;
        assert!(matches!(result, Err(AuthError::InvalidCredential)));
    }
}

#[tokio::test]
async fn test_failures_outside_window_do_not_lock() {
    let (engine, _) = memory_engine(3);
    let now = Utc::now();
    engine
        .register(TEST_IDENTIFIER, TEST_PASSWORD, now)
        .await
        .unwrap();

    let _ = engine.login(TEST_IDENTIFIER, WRONG_PASSWORD, now).await;
    let _ = engine.login(TEST_IDENTIFIER, WRONG_PASSWORD, now).await;

    // Window is 15 minutes; the first two failures have aged out
    let later = now + Duration::minutes(16);
    let result = engine.login(TEST_IDENTIFIER, WRONG_PASSWORD, later).await;
    assert!(matches!(result, Err(AuthError::InvalidCredential)));
}

#[tokio::test]
async fn test_concurrent_failures_lock_exactly_once() {
    let (engine, store) = memory_engine(3);
    let engine = Arc::new(engine);
    let now = Utc::now();
    engine
        .register(TEST_IDENTIFIER, TEST_PASSWORD, now)
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..10 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine.login(TEST_IDENTIFIER, WRONG_PASSWORD, now).await
        }));
    }

    let mut invalid = 0;
    let mut locked = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Err(AuthError::InvalidCredential) => invalid += 1,
            Err(AuthError::AccountLocked) => locked += 1,
            other => panic!("unexpected result: {:?}", other),
        }
    }

    // Attempts are serialized per principal: N-1 plain failures, the rest locked
    assert_eq!(invalid, 2);
    assert_eq!(locked, 8);
    assert!(stored(&store, TEST_IDENTIFIER).await.is_locked());
}

// ============================================================================
// Token lifecycle
// ============================================================================

#[tokio::test]
async fn test_token_valid_until_ttl() {
    let (engine, _) = memory_engine(5);
    let now = Utc::now();
    engine
        .register(TEST_IDENTIFIER, TEST_PASSWORD, now)
        .await
        .unwrap();
    let issued = engine.login(TEST_IDENTIFIER, TEST_PASSWORD, now).await.unwrap();

    for offset in [Duration::zero(), Duration::minutes(30), Duration::minutes(59)] {
        assert!(engine.verify(&issued.token, now + offset).is_ok());
    }
    for offset in [Duration::hours(1), Duration::hours(2)] {
        assert!(matches!(
            engine.verify(&issued.token, now + offset),
            Err(AuthError::Expired)
        ));
    }
}

#[tokio::test]
async fn test_logout_revokes_only_that_token() {
    let (engine, _) = memory_engine(5);
    let now = Utc::now();
    engine
        .register(TEST_IDENTIFIER, TEST_PASSWORD, now)
        .await
        .unwrap();
    let first = engine.login(TEST_IDENTIFIER, TEST_PASSWORD, now).await.unwrap();
    let second = engine.login(TEST_IDENTIFIER, TEST_PASSWORD, now).await.unwrap();

    engine.logout(&first.token, now).await.unwrap();

    assert!(matches!(
        engine.verify(&first.token, now + Duration::seconds(1)),
        Err(AuthError::Revoked)
    ));
    assert!(engine.verify(&second.token, now + Duration::seconds(1)).is_ok());

    // Logging out twice fails: the token is already revoked
    assert!(matches!(
        engine.logout(&first.token, now).await,
        Err(AuthError::Revoked)
    ));
}

#[tokio::test]
async fn test_change_password_revokes_earlier_tokens() {
    // GIVEN: alice holds a token
    let (engine, _) = memory_engine(5);
    let now = Utc::now();
    engine
        .register(TEST_IDENTIFIER, TEST_PASSWORD, now)
        .await
        .unwrap();
    let old_token = engine.login(TEST_IDENTIFIER, TEST_PASSWORD, now).await.unwrap();

    // WHEN: She rotates her password
    let rotated_at = now + Duration::seconds(1);
    engine
        .change_password(TEST_IDENTIFIER, TEST_PASSWORD, NEW_PASSWORD, rotated_at)
        .await
        .unwrap();

    // THEN: The earlier token is revoked and only the new password works
    assert!(matches!(
        engine.verify(&old_token.token, rotated_at),
        Err(AuthError::Revoked)
    ));
    let later = rotated_at + Duration::seconds(1);
    assert!(matches!(
        engine.login(TEST_IDENTIFIER, TEST_PASSWORD, later).await,
        Err(AuthError::InvalidCredential)
    ));
    let fresh = engine.login(TEST_IDENTIFIER, NEW_PASSWORD, later).await.unwrap();
    assert!(engine.verify(&fresh.token, later).is_ok());
}

#[tokio::test]
async fn test_token_issued_at_rotation_instant_survives() {
    let (engine, _) = memory_engine(5);
    let now = Utc::now();
    engine
        .register(TEST_IDENTIFIER, TEST_PASSWORD, now)
        .await
        .unwrap();

    engine
        .change_password(TEST_IDENTIFIER, TEST_PASSWORD, NEW_PASSWORD, now)
        .await
        .unwrap();
    let fresh = engine.login(TEST_IDENTIFIER, NEW_PASSWORD, now).await.unwrap();

    assert!(engine.verify(&fresh.token, now).is_ok());
}

#[tokio::test]
async fn test_change_password_rejects_weak_new_password() {
    let (engine, _) = memory_engine(5);
    let now = Utc::now();
    engine
        .register(TEST_IDENTIFIER, TEST_PASSWORD, now)
        .await
        .unwrap();

    let result = engine
        .change_password(TEST_IDENTIFIER, TEST_PASSWORD, "weak", now)
        .await;
    assert!(matches!(result, Err(AuthError::WeakCredential(_))));
    assert!(engine.login(TEST_IDENTIFIER, TEST_PASSWORD, now).await.is_ok());
}

#[tokio::test]
async fn test_change_password_wrong_current_counts_as_failure() {
    let (engine, _) = memory_engine(2);
    let now = Utc::now();
    engine
        .register(TEST_IDENTIFIER, TEST_PASSWORD, now)
        .await
        .unwrap();

    let first = engine
        .change_password(TEST_IDENTIFIER, WRONG_PASSWORD, NEW_PASSWORD, now)
        .await;
    let second = engine
        .change_password(TEST_IDENTIFIER, WRONG_PASSWORD, NEW_PASSWORD, now)
        .await;

    assert!(matches!(first, Err(AuthError::InvalidCredential)));
    assert!(matches!(second, Err(AuthError::AccountLocked)));
}

#[tokio::test]
async fn test_revoke_all() {
    let (engine, _) = memory_engine(5);
    let now = Utc::now();
    engine
        .register(TEST_IDENTIFIER, TEST_PASSWORD, now)
        .await
        .unwrap();
    let first = engine.login(TEST_IDENTIFIER, TEST_PASSWORD, now).await.unwrap();
    let second = engine.login(TEST_IDENTIFIER, TEST_PASSWORD, now).await.unwrap();

    let revoked_at = now + Duration::seconds(1);
    engine.revoke_all(TEST_IDENTIFIER, revoked_at).await.unwrap();

    for token in [&first.token, &second.token] {
        assert!(matches!(
            engine.verify(token, revoked_at),
            Err(AuthError::Revoked)
        ));
    }
    assert!(matches!(
        engine.revoke_all("nobody", revoked_at).await,
        Err(AuthError::UnknownPrincipal)
    ));
}

#[tokio::test]
async fn test_deactivate_is_soft_delete() {
    let (engine, store) = memory_engine(5);
    let now = Utc::now();
    engine
        .register(TEST_IDENTIFIER, TEST_PASSWORD, now)
        .await
        .unwrap();
    let issued = engine.login(TEST_IDENTIFIER, TEST_PASSWORD, now).await.unwrap();

    let later = now + Duration::seconds(1);
    engine.deactivate(TEST_IDENTIFIER, later).await.unwrap();

    // Reported like an unknown principal, tokens revoked, identifier still reserved
    assert!(matches!(
        engine.login(TEST_IDENTIFIER, TEST_PASSWORD, later).await,
        Err(AuthError::UnknownPrincipal)
    ));
    assert!(matches!(
        engine.verify(&issued.token, later),
        Err(AuthError::Revoked)
    ));
    assert!(matches!(
        engine.register(TEST_IDENTIFIER, TEST_PASSWORD, later).await,
        Err(AuthError::DuplicateIdentifier)
    ));
    assert!(stored(&store, TEST_IDENTIFIER).await.is_deactivated());
}

#[tokio::test]
async fn test_unlock_unknown_principal() {
    let (engine, _) = memory_engine(5);
    assert!(matches!(
        engine.unlock("nobody").await,
        Err(AuthError::UnknownPrincipal)
    ));
}

// ============================================================================
// Store failures
// ============================================================================

#[tokio::test]
async fn test_store_unavailable_is_retryable() {
    let mut store = MockCredentialStore::new();
    store
        .expect_get()
        .returning(|_| Err(StoreError::Unavailable("connection refused".to_string())));
    let engine = engine_with_store(Arc::new(store), 5);

    let err = engine
        .login(TEST_IDENTIFIER, TEST_PASSWORD, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::StoreUnavailable(_)));
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_lock_write_failure_surfaces() {
    // GIVEN: The lock transition cannot be persisted
    let credential = crypto_core::hash_password(TEST_PASSWORD, &fast_hash_params()).unwrap();
    let principal =
        crate::models::Principal::new(TEST_IDENTIFIER.to_string(), credential, Utc::now());

    let mut store = MockCredentialStore::new();
    store
        .expect_get()
        .returning(move |_| Ok(Some(principal.clone())));
    store
        .expect_update_lock_state()
        .returning(|_, _| Err(StoreError::Unavailable("write failed".to_string())));
    let engine = engine_with_store(Arc::new(store), 1);

    // WHEN: The failure that reaches the threshold arrives
    let result = engine
        .login(TEST_IDENTIFIER, WRONG_PASSWORD, Utc::now())
        .await;

    // THEN: The caller learns the store is unavailable
    assert!(matches!(result, Err(AuthError::StoreUnavailable(_))));
}

#[tokio::test]
async fn test_slow_store_times_out() {
    let store = SlowStore {
        delay: std::time::Duration::from_secs(5),
    };
    let engine = engine_with_store(Arc::new(store), 5);

    let result = engine
        .login(TEST_IDENTIFIER, TEST_PASSWORD, Utc::now())
        .await;
    assert!(matches!(result, Err(AuthError::StoreUnavailable(_))));
}
