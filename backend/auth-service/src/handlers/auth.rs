/// Authentication handlers
use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    error::AuthError,
    models::{ChangePasswordRequest, LoginRequest, RegisterRequest},
    AppState,
};

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub identifier: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub token_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    pub subject: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::Malformed)
}

pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), AuthError> {
    state
        .engine
        .register(&payload.identifier, &payload.password, Utc::now())
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            identifier: payload.identifier,
        }),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let issued = state
        .engine
        .login(&payload.identifier, &payload.password, Utc::now())
        .await?;

    Ok(Json(LoginResponse {
        access_token: issued.token,
        token_type: "Bearer",
        token_id: issued.token_id,
        expires_at: issued.expires_at,
    }))
}

pub async fn verify(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<VerifyResponse>, AuthError> {
    let token = bearer_token(&headers)?;
    let subject = state.engine.verify(token, Utc::now())?;
    Ok(Json(VerifyResponse { subject }))
}

pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, AuthError> {
    let token = bearer_token(&headers)?;
    state.engine.logout(token, Utc::now()).await?;
    Ok(Json(MessageResponse {
        message: "Logged out".to_string(),
    }))
}

pub async fn change_password(
    State(state): State<AppState>,
    Json(payload): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    state
        .engine
        .change_password(
            &payload.identifier,
            &payload.current_password,
            &payload.new_password,
            Utc::now(),
        )
        .await?;

    Ok(Json(MessageResponse {
        message: "Password changed; existing sessions revoked".to_string(),
    }))
}
