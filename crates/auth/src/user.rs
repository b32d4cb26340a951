//! Per-user API-key middleware: `X-API-Key`, resolved to a `User` row by
//! plain equality lookup, matching `spec.md`'s "authorization is by
//! equality on token" and the original's `get_current_user` dependency.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use vexa_domain::error::Error;

use crate::AuthState;

pub async fn require_user_token<S: AuthState>(
    State(state): State<S>,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();

    if token.is_empty() {
        return Error::Auth("missing X-API-Key header".into()).into_response();
    }

    match vexa_store::users::find_user_by_token(state.pool(), &token).await {
        Ok(Some(user)) => {
            req.extensions_mut().insert(user);
            next.run(req).await
        }
        Ok(None) => Error::Auth("invalid API key".into()).into_response(),
        Err(e) => {
            tracing::error!(error = %e, "user token lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                axum::Json(serde_json::json!({"detail": "authentication backend unavailable"})),
            )
                .into_response()
        }
    }
}
