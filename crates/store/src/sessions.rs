//! Meeting-session persistence, grounded in
//! `examples/original_source/services/transcription-collector/streaming/processors.py`'s
//! `process_session_start_event` (update-or-insert on `(meeting_id, session_uid)`).

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use vexa_domain::error::{Error, Result};
use vexa_domain::model::MeetingSession;

/// Updates the session's recorded start time if it already exists,
/// otherwise inserts a new row. Returns whether an existing row was
/// overwritten (for `TraceEvent::SessionStartRecorded`).
pub async fn upsert_session_start(
    pool: &PgPool,
    meeting_id: i64,
    session_uid: &str,
    session_start_time: DateTime<Utc>,
) -> Result<bool> {
    let existing: Option<i64> = sqlx::query_scalar(
        "SELECT id FROM meeting_sessions WHERE meeting_id = $1 AND session_uid = $2",
    )
    .bind(meeting_id)
    .bind(session_uid)
    .fetch_optional(pool)
    .await?;

    match existing {
        Some(id) => {
            sqlx::query("UPDATE meeting_sessions SET session_start_time = $2 WHERE id = $1")
                .bind(id)
                .bind(session_start_time)
                .execute(pool)
                .await?;
            Ok(true)
        }
        None => {
            sqlx::query(
                "INSERT INTO meeting_sessions (meeting_id, session_uid, session_start_time)
                 VALUES ($1, $2, $3)",
            )
            .bind(meeting_id)
            .bind(session_uid)
            .bind(session_start_time)
            .execute(pool)
            .await?;
            Ok(false)
        }
    }
}

/// Earliest recorded session for a meeting — used to anchor relative
/// transcript timestamps to wall-clock time, and as the canonical control
/// channel for `stop_bot`/`reconfigure_bot` (`spec.md` §4.3.2/§4.3.3).
pub async fn earliest_session(pool: &PgPool, meeting_id: i64) -> Result<Option<MeetingSession>> {
    sqlx::query_as::<_, MeetingSession>(
        "SELECT id, meeting_id, session_uid, session_start_time, created_at
         FROM meeting_sessions
         WHERE meeting_id = $1
         ORDER BY session_start_time ASC
         LIMIT 1",
    )
    .bind(meeting_id)
    .fetch_optional(pool)
    .await
    .map_err(Error::from)
}

/// All sessions recorded for a meeting, used by the assembler to build the
/// `session_uid -> session_start_time` map it needs for absolute-time
/// reconstruction.
pub async fn for_meeting(pool: &PgPool, meeting_id: i64) -> Result<Vec<MeetingSession>> {
    sqlx::query_as::<_, MeetingSession>(
        "SELECT id, meeting_id, session_uid, session_start_time, created_at
         FROM meeting_sessions
         WHERE meeting_id = $1",
    )
    .bind(meeting_id)
    .fetch_all(pool)
    .await
    .map_err(Error::from)
}

/// Looks up the session a bot's exit callback refers to: `connection_id` is
/// issued as the session's `session_uid` at launch time (`spec.md` §4.3.1
/// step 6/8), so the exit callback's `connection_id` is a direct
/// `session_uid` lookup.
pub async fn find_by_session_uid(
    pool: &PgPool,
    session_uid: &str,
) -> Result<Option<MeetingSession>> {
    sqlx::query_as::<_, MeetingSession>(
        "SELECT id, meeting_id, session_uid, session_start_time, created_at
         FROM meeting_sessions
         WHERE session_uid = $1",
    )
    .bind(session_uid)
    .fetch_optional(pool)
    .await
    .map_err(Error::from)
}
