//! Transcript retrieval endpoint (C8), `spec.md` §4.6.

use axum::extract::{Path, State};
use axum::{Extension, Json};

use vexa_domain::error::{Error, Result};
use vexa_domain::model::{Platform, User};
use vexa_domain::wire::TranscriptResponse;
use vexa_store::meetings;

use crate::state::AppState;

pub async fn get_transcript(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path((platform, native_meeting_id)): Path<(Platform, String)>,
) -> Result<Json<TranscriptResponse>> {
    let meeting = meetings::find_latest(&state.pool, user.id, platform, &native_meeting_id)
        .await?
        .ok_or_else(|| {
            Error::NotFound(format!(
                "No meeting found for platform {} and meeting ID {native_meeting_id}.",
                platform.as_str()
            ))
        })?;

    let transcript = crate::assembler::build_transcript(&state.pool, &state.bus, meeting.id).await?;
    Ok(Json(transcript))
}
