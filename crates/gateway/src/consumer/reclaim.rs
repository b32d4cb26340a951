//! Stale-pending reclaim (C6 supplemental), `spec.md` §4.2/§4.6, grounded in
//! `examples/original_source/services/transcription-collector/main.py`'s
//! periodic `XPENDING`/`XCLAIM` sweep: entries a consumer picked up but
//! never acked (crashed mid-processing) are reclaimed by this consumer and
//! reprocessed through the same handlers the live loops use.

use crate::consumer::{segments, speaker};
use crate::state::AppState;
use vexa_domain::trace::TraceEvent;

pub async fn run_once(state: &AppState) {
    reclaim_stream(
        state,
        &state.config.bus.transcription_stream,
        &state.config.bus.consumer_group,
        Handler::Segments,
    )
    .await;
    reclaim_stream(
        state,
        &state.config.bus.speaker_stream,
        &state.config.bus.speaker_consumer_group,
        Handler::Speaker,
    )
    .await;
}

enum Handler {
    Segments,
    Speaker,
}

async fn reclaim_stream(state: &AppState, stream: &str, group: &str, handler: Handler) {
    let pending = match state.bus.pending_range(stream, group, 500).await {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(error = %e, stream, "failed to list pending entries");
            return;
        }
    };

    let idle_threshold_ms = state.config.bus.stale_pending_idle_secs * 1000;
    let stale: Vec<String> = pending
        .into_iter()
        .filter(|p| p.idle_ms >= idle_threshold_ms)
        .map(|p| p.id)
        .collect();
    if stale.is_empty() {
        return;
    }

    let claimed = state
        .bus
        .claim(stream, group, &state.config.bus.consumer_name, idle_threshold_ms, &stale)
        .await;
    let messages = match claimed {
        Ok(m) => m,
        Err(e) => {
            tracing::warn!(error = %e, stream, "failed to claim stale pending entries");
            return;
        }
    };
    if messages.is_empty() {
        return;
    }

    TraceEvent::StaleMessageReclaimed {
        stream: stream.to_string(),
        consumer: state.config.bus.consumer_name.clone(),
        count: messages.len(),
    }
    .emit();

    for msg in &messages {
        match handler {
            Handler::Segments => segments::handle_one(state, msg).await,
            Handler::Speaker => speaker::handle_one(state, msg).await,
        }
    }
}
