//! Self-service user endpoints (C5), `spec.md` §10, grounded in
//! `admin-api/app/main.py`'s `set_user_webhook`.

use axum::extract::State;
use axum::{Extension, Json};

use vexa_domain::error::Result;
use vexa_domain::model::User;
use vexa_domain::wire::{MessageResponse, SetWebhookBody};
use vexa_store::users;

use crate::state::AppState;

pub async fn set_webhook(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(body): Json<SetWebhookBody>,
) -> Result<Json<MessageResponse>> {
    users::set_webhook_url(&state.pool, user.id, &body.webhook_url).await?;
    Ok(Json(MessageResponse {
        message: "Webhook URL updated successfully.".to_string(),
    }))
}
