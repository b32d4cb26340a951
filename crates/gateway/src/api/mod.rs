//! HTTP router (§10/§4.3), grounded in the teacher's `api/mod.rs`
//! public/protected split: unauthenticated routes merged with two
//! middleware-gated groups, one per API key flavor.

pub mod admin;
pub mod bots;
pub mod health;
pub mod transcripts;
pub mod user;

use axum::middleware;
use axum::routing::{delete, get, patch, post, put};
use axum::Router;

use crate::state::AppState;

pub fn router(state: AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/health", get(health::health))
        .route("/bots/internal/callback/exited", post(bots::exit_callback));

    let user_protected = Router::new()
        .route("/bots", post(bots::request_bot))
        .route("/bots/status", get(bots::bot_status))
        .route("/bots/:platform/:native_meeting_id", delete(bots::stop_bot))
        .route("/bots/:platform/:native_meeting_id/config", put(bots::reconfigure_bot))
        .route("/transcripts/:platform/:native_meeting_id", get(transcripts::get_transcript))
        .route("/user/webhook", put(user::set_webhook))
        .route_layer(middleware::from_fn_with_state(state.clone(), vexa_auth::user::require_user_token));

    let admin_protected = Router::new()
        .route("/admin/users", post(admin::create_user))
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/email/:email", get(admin::get_user_by_email))
        .route("/admin/users/:id", get(admin::get_user))
        .route("/admin/users/:id", patch(admin::update_user))
        .route("/admin/users/:id/tokens", post(admin::create_token))
        .route("/admin/tokens/:id", delete(admin::delete_token))
        .route("/admin/stats/meetings-users", get(admin::meetings_users_stats))
        .route_layer(middleware::from_fn_with_state(state.clone(), vexa_auth::admin::require_admin_token));

    public
        .merge(user_protected)
        .merge(admin_protected)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
