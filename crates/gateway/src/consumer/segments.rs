//! Transcription-stream consumer (C6), `spec.md` §4.6, grounded in
//! `examples/original_source/services/transcription-collector/main.py`'s
//! consume loop and `streaming/processors.py`'s `process_stream_message`.

use chrono::{DateTime, Utc};
use vexa_domain::error::{Error, Result};
use vexa_domain::trace::TraceEvent;
use vexa_domain::wire::{CachedSegment, SessionEndEvent, SessionStartEvent, StreamEvent, TranscriptionEvent};
use vexa_bus::StreamMessage;

use crate::state::AppState;

pub async fn run(state: AppState) {
    let stream = state.config.bus.transcription_stream.clone();
    let group = state.config.bus.consumer_group.clone();
    let consumer = state.config.bus.consumer_name.clone();
    loop {
        if state.shutdown.is_cancelled() {
            return;
        }
        let messages = state
            .bus
            .read_group(&stream, &group, &consumer, state.config.bus.read_count, state.config.bus.block_ms)
            .await;
        match messages {
            Ok(messages) => {
                for msg in &messages {
                    handle_one(&state, msg).await;
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "transcription stream read failed, backing off");
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        }
    }
}

/// Processes one message and applies the ack policy: ack on success or on a
/// persistent/malformed-data error (drop it), leave pending on a transient
/// bus/store failure so the reclaim loop retries it later.
pub(crate) async fn handle_one(state: &AppState, msg: &StreamMessage) {
    let outcome = dispatch(state, msg).await;
    match outcome {
        Ok(()) => ack(state, &msg.id).await,
        Err(e) if e.is_ack_on_fail() => {
            tracing::warn!(error = %e, id = %msg.id, "dropping unprocessable stream message");
            ack(state, &msg.id).await;
        }
        Err(e) => {
            tracing::warn!(error = %e, id = %msg.id, "transcription message left pending for retry");
        }
    }
}

async fn ack(state: &AppState, id: &str) {
    if let Err(e) = state
        .bus
        .ack(&state.config.bus.transcription_stream, &state.config.bus.consumer_group, &[id.to_string()])
        .await
    {
        tracing::warn!(error = %e, id, "failed to ack transcription message");
    }
}

async fn dispatch(state: &AppState, msg: &StreamMessage) -> Result<()> {
    let payload = msg
        .fields
        .get("payload")
        .ok_or_else(|| Error::PersistentData("stream entry missing payload field".into()))?;
    let event: StreamEvent = serde_json::from_str(payload)
        .map_err(|e| Error::PersistentData(format!("malformed stream payload: {e}")))?;

    match event {
        StreamEvent::SessionStart(ev) => handle_session_start(state, ev).await,
        StreamEvent::SessionEnd(ev) => handle_session_end(state, ev).await,
        StreamEvent::Transcription(ev) => handle_transcription(state, ev).await,
    }
}

async fn handle_session_start(state: &AppState, ev: SessionStartEvent) -> Result<()> {
    let user = vexa_store::users::find_user_by_token(&state.pool, &ev.token)
        .await?
        .ok_or_else(|| Error::PersistentData(format!("unknown token for session_start uid={}", ev.uid)))?;
    let meeting = vexa_store::meetings::find_latest(&state.pool, user.id, ev.platform, &ev.meeting_id)
        .await?
        .ok_or_else(|| {
            Error::PersistentData(format!(
                "no meeting for session_start uid={} native_meeting_id={}",
                ev.uid, ev.meeting_id
            ))
        })?;
    let session_start_time: DateTime<Utc> = ev
        .start_timestamp
        .parse()
        .map_err(|e| Error::PersistentData(format!("invalid start_timestamp: {e}")))?;

    let overwritten =
        vexa_store::sessions::upsert_session_start(&state.pool, meeting.id, &ev.uid, session_start_time).await?;

    TraceEvent::SessionStartRecorded {
        session_uid: ev.uid,
        session_start_time,
        overwritten,
    }
    .emit();
    Ok(())
}

async fn handle_session_end(state: &AppState, ev: SessionEndEvent) -> Result<()> {
    state.bus.clear_speaker_events(&ev.uid).await
}

async fn handle_transcription(state: &AppState, ev: TranscriptionEvent) -> Result<()> {
    let uid = ev
        .uid
        .ok_or_else(|| Error::PersistentData("transcription event missing uid".into()))?;
    let user = vexa_store::users::find_user_by_token(&state.pool, &ev.token)
        .await?
        .ok_or_else(|| Error::PersistentData(format!("unknown token for transcription uid={uid}")))?;
    let meeting = vexa_store::meetings::find_latest(&state.pool, user.id, ev.platform, &ev.meeting_id)
        .await?
        .ok_or_else(|| {
            Error::PersistentData(format!(
                "no meeting for transcription uid={uid} native_meeting_id={}",
                ev.meeting_id
            ))
        })?;

    for seg in ev.segments {
        let Some(text) = seg.text else { continue };
        let key = format!("{:.3}", seg.start);
        let cached = CachedSegment {
            text,
            end_time: seg.end,
            language: seg.language,
            updated_at: Utc::now(),
            session_uid: Some(uid.clone()),
            speaker: None,
            speaker_mapping_status: vexa_domain::wire::SpeakerMappingStatus::Unknown,
        };
        let json = serde_json::to_string(&cached)?;
        state
            .bus
            .cache_segment(meeting.id, &key, &json, state.config.bus.segment_hash_ttl_secs)
            .await?;
        TraceEvent::SegmentBuffered {
            meeting_id: meeting.id,
            session_uid: uid.clone(),
            start_time: seg.start,
        }
        .emit();
    }
    Ok(())
}
