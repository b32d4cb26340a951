//! Speaker-events stream consumer (§4.6 supplemental speaker mapping),
//! grounded in
//! `examples/original_source/services/transcription-collector/mapping/speaker_mapper.py`'s
//! `record_speaker_event` caching path.

use vexa_domain::error::{Error, Result};
use vexa_domain::wire::SpeakerEvent;
use vexa_bus::StreamMessage;

use crate::state::AppState;

pub async fn run(state: AppState) {
    let stream = state.config.bus.speaker_stream.clone();
    let group = state.config.bus.speaker_consumer_group.clone();
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
                tracing::warn!(error = %e, "speaker event stream read failed, backing off");
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
            }
        }
    }
}

pub(crate) async fn handle_one(state: &AppState, msg: &StreamMessage) {
    let outcome = dispatch(state, msg).await;
    match outcome {
        Ok(()) => ack(state, &msg.id).await,
        Err(e) if e.is_ack_on_fail() => {
            tracing::warn!(error = %e, id = %msg.id, "dropping unprocessable speaker event message");
            ack(state, &msg.id).await;
        }
        Err(e) => {
            tracing::warn!(error = %e, id = %msg.id, "speaker event message left pending for retry");
        }
    }
}

async fn ack(state: &AppState, id: &str) {
    if let Err(e) = state
        .bus
        .ack(&state.config.bus.speaker_stream, &state.config.bus.speaker_consumer_group, &[id.to_string()])
        .await
    {
        tracing::warn!(error = %e, id, "failed to ack speaker event message");
    }
}

async fn dispatch(state: &AppState, msg: &StreamMessage) -> Result<()> {
    let payload = msg
        .fields
        .get("payload")
        .ok_or_else(|| Error::PersistentData("stream entry missing payload field".into()))?;
    let ev: SpeakerEvent = serde_json::from_str(payload)
        .map_err(|e| Error::PersistentData(format!("malformed speaker event payload: {e}")))?;

    let stored = serde_json::json!({
        "event_type": ev.event_type,
        "participant_id_meet": ev.participant_id,
        "participant_name": ev.participant_name,
    })
    .to_string();

    state
        .bus
        .record_speaker_event(&ev.uid, &stored, ev.relative_timestamp_ms, state.config.bus.speaker_set_ttl_secs)
        .await
}
