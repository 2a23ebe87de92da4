use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use once_cell::sync::Lazy;
use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, TextEncoder};

/// Handler that serialises Prometheus metrics in text format.
pub async fn metrics_handler() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            [(header::CONTENT_TYPE, encoder.format_type().to_string())],
            buffer,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    }
}

/// Force registration of every counter so they show up before first use
pub fn initialize_auth_metrics() {
    Lazy::force(&REGISTER_REQUESTS_TOTAL);
    Lazy::force(&LOGIN_REQUESTS_TOTAL);
    Lazy::force(&LOGIN_FAILURES_TOTAL);
    Lazy::force(&ACCOUNT_LOCKOUTS_TOTAL);
    Lazy::force(&TOKEN_VERIFICATIONS_TOTAL);
    Lazy::force(&TOKEN_REVOCATIONS_TOTAL);
}

fn counter(name: &str, help: &str) -> Option<IntCounter> {
    IntCounter::new(name, help)
        .and_then(|c| {
            prometheus::default_registry().register(Box::new(c.clone()))?;
            Ok(c)
        })
        .map_err(|e| tracing::error!("failed to create {} counter: {}", name, e))
        .ok()
}

fn counter_vec(name: &str, help: &str, labels: &[&str]) -> Option<IntCounterVec> {
    IntCounterVec::new(Opts::new(name, help), labels)
        .and_then(|c| {
            prometheus::default_registry().register(Box::new(c.clone()))?;
            Ok(c)
        })
        .map_err(|e| tracing::error!("failed to create {} counter: {}", name, e))
        .ok()
}

static REGISTER_REQUESTS_TOTAL: Lazy<Option<IntCounter>> = Lazy::new(|| {
    counter(
        "auth_register_requests_total",
        "Total number of register requests",
    )
});

static LOGIN_REQUESTS_TOTAL: Lazy<Option<IntCounter>> = Lazy::new(|| {
    counter("auth_login_requests_total", "Total number of login requests")
});

/// Wrong password or unknown principal
static LOGIN_FAILURES_TOTAL: Lazy<Option<IntCounter>> = Lazy::new(|| {
    counter(
        "auth_login_failures_total",
        "Total number of failed login attempts (wrong password or unknown principal)",
    )
});

static ACCOUNT_LOCKOUTS_TOTAL: Lazy<Option<IntCounter>> = Lazy::new(|| {
    counter(
        "auth_account_lockouts_total",
        "Total number of account lockouts triggered by repeated failures",
    )
});

static TOKEN_VERIFICATIONS_TOTAL: Lazy<Option<IntCounterVec>> = Lazy::new(|| {
    counter_vec(
        "auth_token_verifications_total",
        "Token verifications by outcome",
        &["outcome"],
    )
});

static TOKEN_REVOCATIONS_TOTAL: Lazy<Option<IntCounterVec>> = Lazy::new(|| {
    counter_vec(
        "auth_token_revocations_total",
        "Token revocations by scope (token or principal)",
        &["scope"],
    )
});

#[inline]
pub fn inc_register_requests() {
    if let Some(c) = REGISTER_REQUESTS_TOTAL.as_ref() {
        c.inc();
    }
}

#[inline]
pub fn inc_login_requests() {
    if let Some(c) = LOGIN_REQUESTS_TOTAL.as_ref() {
        c.inc();
    }
}

#[inline]
pub fn inc_login_failures() {
    if let Some(c) = LOGIN_FAILURES_TOTAL.as_ref() {
        c.inc();
    }
}

#[inline]
pub fn inc_account_lockouts() {
    if let Some(c) = ACCOUNT_LOCKOUTS_TOTAL.as_ref() {
        c.inc();
    }
}

/// `outcome` is `ok` or an error code
#[inline]
pub fn inc_token_verifications(outcome: &str) {
    if let Some(c) = TOKEN_VERIFICATIONS_TOTAL.as_ref() {
        c.with_label_values(&[outcome]).inc();
    }
}

#[inline]
pub fn inc_token_revocations(scope: &str) {
    if let Some(c) = TOKEN_REVOCATIONS_TOTAL.as_ref() {
        c.with_label_values(&[scope]).inc();
    }
}
