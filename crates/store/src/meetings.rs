//! Meeting lifecycle persistence, grounded in
//! `examples/original_source/services/bot-manager/main.py`'s meeting
//! creation/lookup/status-transition logic.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use vexa_domain::error::{Error, Result};
use vexa_domain::model::{Meeting, MeetingStatus, Platform};

pub async fn create_meeting(
    pool: &PgPool,
    user_id: i64,
    platform: Platform,
    native_meeting_id: &str,
) -> Result<Meeting> {
    sqlx::query_as::<_, Meeting>(
        "INSERT INTO meetings (user_id, platform, native_meeting_id, status)
         VALUES ($1, $2, $3, 'requested')
         RETURNING id, user_id, platform, native_meeting_id, status,
                   bot_container_id, start_time, end_time, data, created_at, updated_at",
    )
    .bind(user_id)
    .bind(platform)
    .bind(native_meeting_id)
    .fetch_one(pool)
    .await
    .map_err(Error::from)
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Meeting>> {
    sqlx::query_as::<_, Meeting>(
        "SELECT id, user_id, platform, native_meeting_id, status,
                bot_container_id, start_time, end_time, data, created_at, updated_at
         FROM meetings WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(Error::from)
}

/// Newest meeting for `(user, platform, native_meeting_id)` still in an
/// "occupying" state, used for duplicate-request reconciliation,
/// `spec.md` §4.3.2.
pub async fn find_occupying(
    pool: &PgPool,
    user_id: i64,
    platform: Platform,
    native_meeting_id: &str,
) -> Result<Option<Meeting>> {
    sqlx::query_as::<_, Meeting>(
        "SELECT id, user_id, platform, native_meeting_id, status,
                bot_container_id, start_time, end_time, data, created_at, updated_at
         FROM meetings
         WHERE user_id = $1 AND platform = $2 AND native_meeting_id = $3
           AND status IN ('requested', 'active', 'stopping')
         ORDER BY created_at DESC
         LIMIT 1",
    )
    .bind(user_id)
    .bind(platform)
    .bind(native_meeting_id)
    .fetch_optional(pool)
    .await
    .map_err(Error::from)
}

/// Newest meeting for `(user, platform, native_meeting_id)` regardless of
/// status — the lookup the stream consumer uses to attribute an inbound
/// segment to a meeting, matching the original's unfiltered
/// `ORDER BY created_at DESC` meeting query in `process_stream_message`.
pub async fn find_latest(
    pool: &PgPool,
    user_id: i64,
    platform: Platform,
    native_meeting_id: &str,
) -> Result<Option<Meeting>> {
    sqlx::query_as::<_, Meeting>(
        "SELECT id, user_id, platform, native_meeting_id, status,
                bot_container_id, start_time, end_time, data, created_at, updated_at
         FROM meetings
         WHERE user_id = $1 AND platform = $2 AND native_meeting_id = $3
         ORDER BY created_at DESC
         LIMIT 1",
    )
    .bind(user_id)
    .bind(platform)
    .bind(native_meeting_id)
    .fetch_optional(pool)
    .await
    .map_err(Error::from)
}

pub async fn set_status(pool: &PgPool, id: i64, status: MeetingStatus) -> Result<()> {
    sqlx::query("UPDATE meetings SET status = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn set_container_started(
    pool: &PgPool,
    id: i64,
    bot_container_id: &str,
    start_time: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "UPDATE meetings SET status = 'active', bot_container_id = $2, start_time = $3,
                updated_at = now()
         WHERE id = $1",
    )
    .bind(id)
    .bind(bot_container_id)
    .bind(start_time)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_ended(
    pool: &PgPool,
    id: i64,
    status: MeetingStatus,
    end_time: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(
        "UPDATE meetings SET status = $2, end_time = $3, updated_at = now() WHERE id = $1",
    )
    .bind(id)
    .bind(status)
    .bind(end_time)
    .execute(pool)
    .await?;
    Ok(())
}

/// All meetings for a user still occupying a slot, newest first — the
/// listing `GET /bots` returns.
pub async fn list_active_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<Meeting>> {
    sqlx::query_as::<_, Meeting>(
        "SELECT id, user_id, platform, native_meeting_id, status,
                bot_container_id, start_time, end_time, data, created_at, updated_at
         FROM meetings
         WHERE user_id = $1 AND status IN ('requested', 'active', 'stopping')
         ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(Error::from)
}

/// Merges the reconfigure request's `language`/`task` into a meeting's
/// `data` column, so a later read sees the last config pushed to the bot
/// even though delivery itself is the fire-and-forget pub/sub command.
pub async fn update_config(
    pool: &PgPool,
    id: i64,
    language: Option<&str>,
    task: Option<&str>,
) -> Result<()> {
    sqlx::query(
        "UPDATE meetings SET data = data
            || jsonb_strip_nulls(jsonb_build_object('language', $2::text, 'task', $3::text)),
            updated_at = now()
         WHERE id = $1",
    )
    .bind(id)
    .bind(language)
    .bind(task)
    .execute(pool)
    .await?;
    Ok(())
}
