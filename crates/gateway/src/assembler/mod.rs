//! Transcript assembly (C8), `spec.md` §4.6, grounded in
//! `examples/original_source/services/transcription-collector/api/endpoints.py`'s
//! `_get_full_transcript_segments`: merges rows already promoted to Postgres
//! with segments still buffered in the `meeting:<id>:segments` Redis hash
//! (the hash entry wins on a `start_time` collision, since it is the more
//! current copy), reconstructs each segment's absolute wall-clock time from
//! its session's recorded start, and resolves a speaker for any buffered
//! segment that hasn't been mapped yet via an on-read overlap join against
//! that session's speaker-event sorted set.

pub mod speaker_map;

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use vexa_bus::Bus;
use vexa_domain::error::{Error, Result};
use vexa_domain::model::Transcription;
use vexa_domain::platform::strip_platform_prefix;
use vexa_domain::wire::{CachedSegment, TranscriptResponse, TranscriptSegmentResponse};
use vexa_store::{sessions, transcriptions};

struct MergedSegment {
    start_time: f64,
    end_time: f64,
    text: String,
    language: Option<String>,
    speaker: Option<String>,
    session_uid: Option<String>,
}

pub async fn build_transcript(pool: &sqlx::PgPool, bus: &Bus, meeting_id: i64) -> Result<TranscriptResponse> {
    let meeting = vexa_store::meetings::find_by_id(pool, meeting_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("meeting {meeting_id} not found")))?;

    let session_starts: HashMap<String, DateTime<Utc>> = sessions::for_meeting(pool, meeting_id)
        .await?
        .into_iter()
        .map(|s| (s.session_uid, s.session_start_time))
        .collect();

    // Keyed by the same `"{start:.3}"` field name used in the Redis hash, so
    // a still-buffered segment naturally overrides its promoted counterpart.
    let mut merged: HashMap<String, MergedSegment> = HashMap::new();

    for row in transcriptions::for_meeting(pool, meeting_id).await? {
        let key = format!("{:.3}", row.start_time);
        merged.insert(key, from_promoted(row));
    }

    for (key, raw) in bus.get_cached_segments(meeting_id).await? {
        let Ok(start_time) = key.parse::<f64>() else {
            tracing::warn!(meeting_id, key, "cached segment key is not a float, skipping");
            continue;
        };
        let segment: CachedSegment = match serde_json::from_str(&raw) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(meeting_id, key, error = %e, "skipping malformed cached segment");
                continue;
            }
        };
        // Some producers prefix the session_uid they emit with their
        // platform name; strip it before it is used to look up the
        // session's recorded start time.
        let session_uid = segment
            .session_uid
            .as_deref()
            .map(strip_platform_prefix)
            .map(str::to_string);
        merged.insert(
            key,
            MergedSegment {
                start_time,
                end_time: segment.end_time,
                text: segment.text,
                language: segment.language,
                speaker: segment.speaker,
                session_uid,
            },
        );
    }

    let mut speaker_events_cache: HashMap<String, Vec<(String, f64)>> = HashMap::new();
    let mut segments = Vec::with_capacity(merged.len());

    for (_, seg) in merged {
        let Some(session_uid) = seg.session_uid.as_deref() else {
            tracing::warn!(meeting_id, start_time = seg.start_time, "segment has no session_uid, dropping");
            continue;
        };
        let Some(session_start) = session_starts.get(session_uid) else {
            tracing::warn!(
                meeting_id,
                start_time = seg.start_time,
                session_uid,
                "segment's session has no recorded start time, dropping"
            );
            continue;
        };

        let speaker = match seg.speaker {
            Some(s) => Some(s),
            None => {
                if !speaker_events_cache.contains_key(session_uid) {
                    let fetched = bus.speaker_events_for_session(session_uid).await?;
                    speaker_events_cache.insert(session_uid.to_string(), fetched);
                }
                let events = &speaker_events_cache[session_uid];
                // Segment timestamps are in seconds; speaker-event
                // timestamps are relative milliseconds, so both bounds are
                // scaled up before the overlap join, matching
                // `processors.py`'s `segment_start_ms = start_time * 1000`.
                speaker_map::map_speaker_to_segment(seg.start_time * 1000.0, seg.end_time * 1000.0, events, None)
                    .speaker_name
            }
        };

        let start_ms = (seg.start_time * 1000.0).round() as i64;
        let end_ms = (seg.end_time * 1000.0).round() as i64;
        segments.push(TranscriptSegmentResponse {
            start_time: seg.start_time,
            end_time: seg.end_time,
            text: seg.text,
            language: seg.language,
            speaker,
            absolute_start_time: *session_start + chrono::Duration::milliseconds(start_ms),
            absolute_end_time: *session_start + chrono::Duration::milliseconds(end_ms),
        });
    }

    segments.sort_by(|a, b| a.start_time.total_cmp(&b.start_time));

    Ok(TranscriptResponse {
        meeting_id,
        platform: meeting.platform,
        native_meeting_id: meeting.native_meeting_id,
        status: meeting.status.as_str().to_string(),
        segments,
    })
}

fn from_promoted(row: Transcription) -> MergedSegment {
    MergedSegment {
        start_time: row.start_time,
        end_time: row.end_time,
        text: row.text,
        language: row.language,
        speaker: row.speaker,
        session_uid: Some(row.session_uid),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promoted_row_converts_fields_verbatim() {
        let row = Transcription {
            id: 1,
            meeting_id: 42,
            session_uid: "s1".into(),
            start_time: 1.0,
            end_time: 2.5,
            text: "hello".into(),
            language: Some("en".into()),
            speaker: Some("Alice".into()),
            created_at: chrono::Utc::now(),
        };
        let segment = from_promoted(row);
        assert_eq!(segment.start_time, 1.0);
        assert_eq!(segment.text, "hello");
        assert_eq!(segment.speaker.as_deref(), Some("Alice"));
        assert_eq!(segment.session_uid.as_deref(), Some("s1"));
    }
}
