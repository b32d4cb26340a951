//! User + API token persistence, grounded in
//! `examples/original_source/services/admin-api/app/main.py`'s user CRUD
//! and token issuance endpoints.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use vexa_domain::error::{Error, Result};
use vexa_domain::model::{ApiToken, User};

pub async fn create_user(
    pool: &PgPool,
    email: &str,
    name: Option<&str>,
    image_url: Option<&str>,
    max_concurrent_bots: i32,
) -> Result<User> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (email, name, image_url, max_concurrent_bots) VALUES ($1, $2, $3, $4)
         RETURNING id, email, name, image_url, max_concurrent_bots, data, created_at",
    )
    .bind(email)
    .bind(name)
    .bind(image_url)
    .bind(max_concurrent_bots)
    .fetch_one(pool)
    .await
    .map_err(Error::from)
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "SELECT id, email, name, image_url, max_concurrent_bots, data, created_at
         FROM users WHERE email = $1",
    )
    .bind(email)
    .fetch_optional(pool)
    .await
    .map_err(Error::from)
}

pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "SELECT id, email, name, image_url, max_concurrent_bots, data, created_at
         FROM users WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await
    .map_err(Error::from)
}

pub async fn list_users(pool: &PgPool, limit: i64, offset: i64) -> Result<Vec<User>> {
    sqlx::query_as::<_, User>(
        "SELECT id, email, name, image_url, max_concurrent_bots, data, created_at
         FROM users ORDER BY id ASC LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(Error::from)
}

/// Partial update: only fields explicitly provided are touched. Matches the
/// original's `PATCH /admin/users/{id}`, which rejects attempts to change
/// `email` outright rather than applying one.
pub async fn update_user(
    pool: &PgPool,
    id: i64,
    name: Option<&str>,
    image_url: Option<&str>,
    max_concurrent_bots: Option<i32>,
) -> Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "UPDATE users SET
            name = COALESCE($2, name),
            image_url = COALESCE($3, image_url),
            max_concurrent_bots = COALESCE($4, max_concurrent_bots)
         WHERE id = $1
         RETURNING id, email, name, image_url, max_concurrent_bots, data, created_at",
    )
    .bind(id)
    .bind(name)
    .bind(image_url)
    .bind(max_concurrent_bots)
    .fetch_optional(pool)
    .await
    .map_err(Error::from)
}

/// Merges `{"webhook_url": ...}` into the user's `data` JSONB column,
/// matching the original's `attributes.flag_modified(user, 'data')` pattern
/// for mutating a JSON column in place.
pub async fn set_webhook_url(pool: &PgPool, user_id: i64, webhook_url: &str) -> Result<()> {
    sqlx::query(
        "UPDATE users SET data = data || jsonb_build_object('webhook_url', $2::text)
         WHERE id = $1",
    )
    .bind(user_id)
    .bind(webhook_url)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn create_token(pool: &PgPool, user_id: i64, token: &str) -> Result<ApiToken> {
    sqlx::query_as::<_, ApiToken>(
        "INSERT INTO api_tokens (token, user_id) VALUES ($1, $2)
         RETURNING id, token, user_id, created_at",
    )
    .bind(token)
    .bind(user_id)
    .fetch_one(pool)
    .await
    .map_err(Error::from)
}

/// API tokens belonging to a user, matching the original's
/// `selectinload(User.api_tokens)` eager load for `GET /admin/users/{id}`.
pub async fn tokens_for_user(pool: &PgPool, user_id: i64) -> Result<Vec<ApiToken>> {
    sqlx::query_as::<_, ApiToken>(
        "SELECT id, token, user_id, created_at FROM api_tokens WHERE user_id = $1 ORDER BY id ASC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await
    .map_err(Error::from)
}

pub async fn delete_token(pool: &PgPool, token_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM api_tokens WHERE id = $1")
        .bind(token_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// API-key authentication: a plain equality lookup joining token -> user,
/// per `spec.md`'s "authorization is by equality on token".
pub async fn find_user_by_token(pool: &PgPool, token: &str) -> Result<Option<User>> {
    sqlx::query_as::<_, User>(
        "SELECT u.id, u.email, u.name, u.image_url, u.max_concurrent_bots, u.data, u.created_at
         FROM users u
         JOIN api_tokens t ON t.user_id = u.id
         WHERE t.token = $1",
    )
    .bind(token)
    .fetch_optional(pool)
    .await
    .map_err(Error::from)
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MeetingUserStatRow {
    pub meeting_id: i64,
    pub user_id: i64,
    pub user_email: String,
    pub platform: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

pub async fn count_meetings(pool: &PgPool) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM meetings")
        .fetch_one(pool)
        .await
        .map_err(Error::from)
}

/// Paginated meetings-joined-with-users stats, matching the admin surface's
/// `/admin/stats/meetings-users`.
pub async fn meetings_joined_with_users(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<Vec<MeetingUserStatRow>> {
    sqlx::query_as::<_, MeetingUserStatRow>(
        "SELECT m.id AS meeting_id, u.id AS user_id, u.email AS user_email,
                m.platform, m.status, m.created_at
         FROM meetings m
         JOIN users u ON u.id = m.user_id
         ORDER BY m.created_at DESC
         LIMIT $1 OFFSET $2",
    )
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await
    .map_err(Error::from)
}
