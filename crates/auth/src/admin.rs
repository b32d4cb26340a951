//! Admin-key middleware: `X-Admin-API-Key`, grounded in
//! `admin-api/app/main.py`'s `verify_admin_token` (403 on mismatch, rather
//! than the bearer-token teacher middleware's 401 — kept for compatibility
//! with existing admin-surface clients).

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::AuthState;

pub async fn require_admin_token<S: AuthState>(
    State(state): State<S>,
    req: Request<Body>,
    next: Next,
) -> Response {
    let provided = req
        .headers()
        .get("x-admin-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let provided_hash = Sha256::digest(provided.as_bytes());
    if !bool::from(provided_hash.ct_eq(state.admin_token_hash())) {
        return (
            StatusCode::FORBIDDEN,
            axum::Json(serde_json::json!({"detail": "invalid admin API key"})),
        )
            .into_response();
    }

    next.run(req).await
}
