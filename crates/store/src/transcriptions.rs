//! Transcript persistence, grounded in
//! `examples/original_source/services/transcription-collector/background/db_writer.py`'s
//! promotion-to-Postgres step.

use sqlx::PgPool;
use vexa_domain::error::{Error, Result};
use vexa_domain::model::Transcription;

pub struct NewTranscription<'a> {
    pub meeting_id: i64,
    pub session_uid: &'a str,
    pub start_time: f64,
    pub end_time: f64,
    pub text: &'a str,
    pub language: Option<&'a str>,
    pub speaker: Option<&'a str>,
}

/// Insert used by the promoter (C7): a transcript segment is identified
/// within a meeting by `(start_time, session_uid)`, `spec.md` §3's
/// duplicate-rejection invariant — a conflict here means this exact segment
/// was already promoted (e.g. a promoter cycle double-processed a field
/// before its hash-delete landed), so it is silently skipped rather than
/// erroring the whole promotion batch.
pub async fn try_insert(
    pool: &PgPool,
    row: NewTranscription<'_>,
) -> Result<Option<Transcription>> {
    sqlx::query_as::<_, Transcription>(
        "INSERT INTO transcriptions
            (meeting_id, session_uid, start_time, end_time, text, language, speaker)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (meeting_id, start_time, session_uid) DO NOTHING
         RETURNING id, meeting_id, session_uid, start_time, end_time, text, language, speaker, created_at",
    )
    .bind(row.meeting_id)
    .bind(row.session_uid)
    .bind(row.start_time)
    .bind(row.end_time)
    .bind(row.text)
    .bind(row.language)
    .bind(row.speaker)
    .fetch_optional(pool)
    .await
    .map_err(Error::from)
}

/// Full transcript for a meeting, ordered for display — the shape C8's
/// retrieval endpoint returns.
pub async fn for_meeting(pool: &PgPool, meeting_id: i64) -> Result<Vec<Transcription>> {
    sqlx::query_as::<_, Transcription>(
        "SELECT id, meeting_id, session_uid, start_time, end_time, text, language, speaker, created_at
         FROM transcriptions
         WHERE meeting_id = $1
         ORDER BY start_time ASC",
    )
    .bind(meeting_id)
    .fetch_all(pool)
    .await
    .map_err(Error::from)
}
