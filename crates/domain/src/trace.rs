use serde::Serialize;

/// Structured trace events emitted across the Vexa crates.
///
/// Each variant is logged once via [`TraceEvent::emit`] as a single
/// `tracing::info!` record carrying the serialized event as a field, the
/// same shape the rest of the service uses for request-scoped logging.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    BotRequested {
        meeting_id: i64,
        user_id: i64,
        platform: String,
        native_meeting_id: String,
    },
    BotAdmissionRejected {
        user_id: i64,
        running: usize,
        max_concurrent: i32,
    },
    BotDuplicateReconciled {
        old_meeting_id: i64,
        new_meeting_id: i64,
        container_was_running: bool,
    },
    BotStarted {
        meeting_id: i64,
        container_id: String,
    },
    BotStopRequested {
        meeting_id: i64,
        session_uid: String,
        delay_secs: u64,
    },
    BotExited {
        meeting_id: i64,
        exit_code: i32,
        status: String,
    },
    SessionStartRecorded {
        session_uid: String,
        session_start_time: chrono::DateTime<chrono::Utc>,
        overwritten: bool,
    },
    SegmentBuffered {
        meeting_id: i64,
        session_uid: String,
        start_time: f64,
    },
    SegmentPromoted {
        meeting_id: i64,
        start_time: f64,
        accepted: bool,
    },
    StaleMessageReclaimed {
        stream: String,
        consumer: String,
        count: usize,
    },
    PostMeetingTaskRun {
        meeting_id: i64,
        task: String,
        ok: bool,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "vexa_event");
    }
}
