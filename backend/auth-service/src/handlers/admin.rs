/// Administrative handlers
///
/// Mounted behind [`require_admin_key`]; without a configured key every admin
/// route answers 403.
use axum::{
    extract::{Path, Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
    Json,
};
use chrono::Utc;
use subtle::ConstantTimeEq;

use super::auth::MessageResponse;
use crate::{error::AuthError, AppState};

pub const ADMIN_KEY_HEADER: &str = "x-admin-key";

pub async fn require_admin_key(
    State(state): State<AppState>,
    headers: HeaderMap,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let expected = state.admin_key.as_deref().ok_or(AuthError::Forbidden)?;
    let presented = headers
        .get(ADMIN_KEY_HEADER)
        .map(|value| value.as_bytes())
        .ok_or(AuthError::Forbidden)?;

    if !bool::from(presented.ct_eq(expected.as_bytes())) {
        tracing::warn!("Rejected admin request with a bad key");
        return Err(AuthError::Forbidden);
    }
    Ok(next.run(request).await)
}

pub async fn unlock(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<MessageResponse>, AuthError> {
    state.engine.unlock(&identifier).await?;
    Ok(Json(MessageResponse {
        message: format!("{} unlocked", identifier),
    }))
}

pub async fn revoke_all(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<MessageResponse>, AuthError> {
    state.engine.revoke_all(&identifier, Utc::now()).await?;
    Ok(Json(MessageResponse {
        message: format!("All tokens of {} revoked", identifier),
    }))
}

pub async fn deactivate(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<MessageResponse>, AuthError> {
    state.engine.deactivate(&identifier, Utc::now()).await?;
    Ok(Json(MessageResponse {
        message: format!("{} deactivated", identifier),
    }))
}
