//! Health check endpoint
//!
//! `/health` reports liveness along with key-store and ledger counters.
//! A ledger that cannot be read turns the response into a 503.

use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;
use tracing::warn;

use super::auth_routes::json_response;
use super::BoxBody;
use crate::crypto::EphemeralKeyStats;
use crate::server::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub healthy: bool,
    pub version: &'static str,
    /// Uptime in seconds
    pub uptime: u64,
    pub mode: &'static str,
    pub field_cipher: &'static str,
    pub ephemeral_keys: EphemeralKeyStats,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revoked_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// GET /health
pub async fn health_check(state: Arc<AppState>) -> Response<BoxBody> {
    let ephemeral_keys = state.session.keys().stats().await;

    let (revoked_tokens, error) = match state.session.ledger().len().await {
        Ok(count) => (Some(count), None),
        Err(e) => {
            warn!("Health check could not read the revocation ledger: {}", e);
            (None, Some("revocation ledger unavailable".to_string()))
        }
    };

    let healthy = error.is_none();
    let body = HealthResponse {
        healthy,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        mode: if state.args.dev_mode {
            "development"
        } else {
            "production"
        },
        field_cipher: state.session.cipher().as_str(),
        ephemeral_keys,
        revoked_tokens,
        error,
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    json_response(status, &body)
}
