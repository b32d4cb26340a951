//! Segment-to-speaker mapping (§4.6 supplemental speaker mapping), ported
//! from `examples/original_source/services/transcription-collector/mapping/speaker_mapper.py`'s
//! `map_speaker_to_segment`. The overlap heuristic here is intentionally the
//! same "simplified" one the original used, not a more rigorous interval
//! assignment — callers should not expect it to resolve genuinely
//! overlapping speech perfectly.

use serde::Deserialize;
use vexa_domain::wire::{SpeakerEventType, SpeakerMappingStatus};

#[derive(Debug, Clone)]
pub struct SpeakerMapping {
    pub speaker_name: Option<String>,
    pub participant_id_meet: Option<String>,
    pub status: SpeakerMappingStatus,
}

#[derive(Deserialize)]
struct ParsedEvent {
    event_type: SpeakerEventType,
    participant_id_meet: Option<String>,
    participant_name: String,
}

/// `speaker_events` is the session's `(event_json, relative_timestamp_ms)`
/// pairs, in chronological order, as returned by
/// `vexa_bus::Bus::speaker_events_for_session`.
pub fn map_speaker_to_segment(
    segment_start_ms: f64,
    segment_end_ms: f64,
    speaker_events: &[(String, f64)],
    session_end_time_ms: Option<f64>,
) -> SpeakerMapping {
    if speaker_events.is_empty() {
        return SpeakerMapping {
            speaker_name: None,
            participant_id_meet: None,
            status: SpeakerMappingStatus::NoSpeakerEvents,
        };
    }

    let mut parsed: Vec<(ParsedEvent, f64)> = Vec::with_capacity(speaker_events.len());
    for (event_json, ts) in speaker_events {
        match serde_json::from_str::<ParsedEvent>(event_json) {
            Ok(event) => parsed.push((event, *ts)),
            Err(e) => {
                tracing::warn!(error = %e, "failed to parse speaker event json");
            }
        }
    }

    if parsed.is_empty() {
        return SpeakerMapping {
            speaker_name: None,
            participant_id_meet: None,
            status: SpeakerMappingStatus::Error,
        };
    }

    // participant_id (or name fallback) -> the START event that currently
    // looks like it applies.
    let mut candidates: Vec<(String, usize)> = Vec::new();

    for (idx, (event, ts)) in parsed.iter().enumerate() {
        let Some(participant_id) = event
            .participant_id_meet
            .clone()
            .or_else(|| Some(event.participant_name.clone()))
            .filter(|s| !s.is_empty())
        else {
            continue;
        };

        match event.event_type {
            SpeakerEventType::SpeakerStart => {
                if *ts <= segment_end_ms {
                    if let Some(slot) = candidates.iter_mut().find(|(p, _)| *p == participant_id) {
                        slot.1 = idx;
                    } else {
                        candidates.push((participant_id, idx));
                    }
                }
            }
            SpeakerEventType::SpeakerEnd => {
                if *ts < segment_start_ms {
                    candidates.retain(|(p, _)| *p != participant_id);
                }
            }
        }
    }

    struct Active {
        name: String,
        id: Option<String>,
        overlap_duration: f64,
    }

    let mut active_in_segment: Vec<Active> = Vec::new();

    for (participant_id, start_idx) in &candidates {
        let (start_event, start_ts) = &parsed[*start_idx];
        let start_ts = *start_ts;

        let mut end_ts = session_end_time_ms.unwrap_or(segment_end_ms);
        for (event, ts) in &parsed {
            let matches = event
                .participant_id_meet
                .as_deref()
                .map(|id| id == participant_id)
                .unwrap_or(false)
                || event.participant_name == *participant_id;
            if matches && event.event_type == SpeakerEventType::SpeakerEnd && *ts >= start_ts {
                end_ts = *ts;
                break;
            }
        }

        let overlap_start = start_ts.max(segment_start_ms);
        let overlap_end = end_ts.min(segment_end_ms);

        if overlap_start < overlap_end {
            active_in_segment.push(Active {
                name: start_event.participant_name.clone(),
                id: start_event.participant_id_meet.clone(),
                overlap_duration: overlap_end - overlap_start,
            });
        }
    }

    if active_in_segment.is_empty() {
        return SpeakerMapping {
            speaker_name: None,
            participant_id_meet: None,
            status: SpeakerMappingStatus::Unknown,
        };
    }

    if active_in_segment.len() == 1 {
        let winner = active_in_segment.into_iter().next().unwrap();
        return SpeakerMapping {
            speaker_name: Some(winner.name),
            participant_id_meet: winner.id,
            status: SpeakerMappingStatus::Mapped,
        };
    }

    active_in_segment.sort_by(|a, b| b.overlap_duration.total_cmp(&a.overlap_duration));
    let winner = active_in_segment.into_iter().next().unwrap();
    tracing::info!(
        speaker = %winner.name,
        segment_start_ms,
        segment_end_ms,
        "multiple speakers overlap segment, selected longest overlap"
    );
    SpeakerMapping {
        speaker_name: Some(winner.name),
        participant_id_meet: winner.id,
        status: SpeakerMappingStatus::Multiple,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start_event(name: &str, id: Option<&str>) -> String {
        serde_json::json!({
            "event_type": "SPEAKER_START",
            "participant_id_meet": id,
            "participant_name": name,
        })
        .to_string()
    }

    fn end_event(name: &str, id: Option<&str>) -> String {
        serde_json::json!({
            "event_type": "SPEAKER_END",
            "participant_id_meet": id,
            "participant_name": name,
        })
        .to_string()
    }

    #[test]
    fn no_events_is_no_speaker_events() {
        let mapping = map_speaker_to_segment(0.0, 1000.0, &[], None);
        assert_eq!(mapping.status, SpeakerMappingStatus::NoSpeakerEvents);
    }

    #[test]
    fn single_speaker_overlapping_segment_maps() {
        let events = vec![(start_event("Alice", Some("p1")), 0.0)];
        let mapping = map_speaker_to_segment(100.0, 2000.0, &events, None);
        assert_eq!(mapping.status, SpeakerMappingStatus::Mapped);
        assert_eq!(mapping.speaker_name.as_deref(), Some("Alice"));
        assert_eq!(mapping.participant_id_meet.as_deref(), Some("p1"));
    }

    #[test]
    fn speaker_who_ended_before_segment_is_not_selected() {
        let events = vec![
            (start_event("Alice", Some("p1")), 0.0),
            (end_event("Alice", Some("p1")), 50.0),
        ];
        let mapping = map_speaker_to_segment(1000.0, 2000.0, &events, None);
        assert_eq!(mapping.status, SpeakerMappingStatus::Unknown);
    }

    #[test]
    fn two_overlapping_speakers_picks_longest_overlap() {
        let events = vec![
            (start_event("Alice", Some("p1")), 0.0),
            (start_event("Bob", Some("p2")), 900.0),
        ];
        // segment [0, 2000]: Alice overlaps [0,2000]=2000ms, Bob overlaps [900,2000]=1100ms
        let mapping = map_speaker_to_segment(0.0, 2000.0, &events, None);
        assert_eq!(mapping.status, SpeakerMappingStatus::Multiple);
        assert_eq!(mapping.speaker_name.as_deref(), Some("Alice"));
    }

    #[test]
    fn falls_back_to_participant_name_when_id_absent() {
        let events = vec![(start_event("Alice", None), 0.0)];
        let mapping = map_speaker_to_segment(0.0, 1000.0, &events, None);
        assert_eq!(mapping.status, SpeakerMappingStatus::Mapped);
        assert_eq!(mapping.speaker_name.as_deref(), Some("Alice"));
        assert_eq!(mapping.participant_id_meet, None);
    }
}
