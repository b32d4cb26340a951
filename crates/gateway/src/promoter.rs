//! Segment buffer promoter (C7), `spec.md` §4.5, grounded in
//! `examples/original_source/services/transcription-collector/background/db_writer.py`'s
//! `process_redis_to_postgres`: sweeps `active_meetings`, promotes any
//! cached segment whose `updated_at` is older than the immutability
//! threshold (so a segment still being revised by the bot stays buffered),
//! applies the text filter, and deletes every segment it dealt with from
//! the Redis hash regardless of whether it passed the filter.

use chrono::{DateTime, Utc};
use vexa_domain::error::Result;
use vexa_domain::trace::TraceEvent;
use vexa_domain::wire::CachedSegment;
use vexa_store::transcriptions::{self, NewTranscription};

use crate::state::AppState;

pub async fn run_once(state: &AppState) -> Result<()> {
    let meeting_ids = state.bus.active_meeting_ids().await?;
    for meeting_id in meeting_ids {
        if let Err(e) = promote_meeting(state, meeting_id).await {
            tracing::warn!(error = %e, meeting_id, "promotion sweep failed for meeting");
        }
    }
    Ok(())
}

async fn promote_meeting(state: &AppState, meeting_id: i64) -> Result<()> {
    let cached = state.bus.get_cached_segments(meeting_id).await?;
    if cached.is_empty() {
        state.bus.remove_active_meeting(meeting_id).await?;
        return Ok(());
    }

    let cutoff: DateTime<Utc> =
        Utc::now() - chrono::Duration::seconds(state.config.promoter.immutability_threshold_secs);

    let mut keys_to_delete = Vec::new();

    for (key, raw) in cached {
        let Ok(start_time) = key.parse::<f64>() else {
            tracing::warn!(meeting_id, key, "cached segment key is not a float, dropping");
            keys_to_delete.push(key);
            continue;
        };

        let segment: CachedSegment = match serde_json::from_str(&raw) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(meeting_id, key, error = %e, "dropping malformed cached segment");
                keys_to_delete.push(key);
                continue;
            }
        };

        if segment.updated_at >= cutoff {
            continue; // still mutable, leave it buffered
        }

        let Some(session_uid) = segment.session_uid.clone() else {
            tracing::warn!(meeting_id, key, "cached segment missing session_uid, dropping");
            keys_to_delete.push(key);
            continue;
        };

        let accepted = state.filter.accepts(&segment.text);
        if accepted {
            let row = NewTranscription {
                meeting_id,
                session_uid: &session_uid,
                start_time,
                end_time: segment.end_time,
                text: &segment.text,
                language: segment.language.as_deref(),
                speaker: None,
            };
            // Only drop the buffered field once the insert has actually
            // landed (or the row already exists under the conflict target).
            // A transient store failure leaves the field buffered so the
            // next sweep retries it, matching db_writer.py's
            // commit-then-hdel / rollback-and-keep-buffered behavior.
            if let Err(e) = transcriptions::try_insert(&state.pool, row).await {
                tracing::warn!(error = %e, meeting_id, start_time, "failed to store promoted segment, leaving buffered for retry");
                continue;
            }
        }
        TraceEvent::SegmentPromoted {
            meeting_id,
            start_time,
            accepted,
        }
        .emit();
        keys_to_delete.push(key);
    }

    if !keys_to_delete.is_empty() {
        state.bus.delete_cached_segments(meeting_id, &keys_to_delete).await?;
    }

    Ok(())
}
