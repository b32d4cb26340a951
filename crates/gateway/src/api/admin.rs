//! Admin user/token/stats endpoints (§10), grounded in
//! `admin-api/app/main.py`'s admin router: user find-or-create, listing,
//! lookup by id/email, partial update, token issuance/revocation, and the
//! paginated meetings-with-users stats view.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use rand::Rng;
use serde::Deserialize;

use vexa_domain::error::{Error, Result};
use vexa_domain::wire::{
    CreateUserBody, PaginatedMeetingUserStats, TokenResponse, UpdateUserBody, UserDetailResponse,
    UserResponse,
};
use vexa_store::users;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    skip: i64,
    #[serde(default = "default_limit")]
    limit: i64,
}

fn default_limit() -> i64 {
    100
}

/// Matches the original's `generate_secure_token`: 40 chars drawn from
/// `[A-Za-z0-9]`.
fn generate_secure_token() -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
    let mut rng = rand::thread_rng();
    (0..40)
        .map(|_| {
            let idx = rng.gen_range(0..ALPHABET.len());
            ALPHABET[idx] as char
        })
        .collect()
}

/// Find-or-create by email: returns `200` with the existing user if the
/// email is already registered, `201` if a new row was created.
pub async fn create_user(
    State(state): State<AppState>,
    Json(body): Json<CreateUserBody>,
) -> Result<(StatusCode, Json<UserResponse>)> {
    if let Some(existing) = users::find_by_email(&state.pool, &body.email).await? {
        return Ok((StatusCode::OK, Json(UserResponse::from(&existing))));
    }

    let user = users::create_user(
        &state.pool,
        &body.email,
        body.name.as_deref(),
        body.image_url.as_deref(),
        body.max_concurrent_bots.unwrap_or(1),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(UserResponse::from(&user))))
}

pub async fn list_users(State(state): State<AppState>, Query(page): Query<Pagination>) -> Result<Json<Vec<UserResponse>>> {
    let users = users::list_users(&state.pool, page.limit, page.skip).await?;
    Ok(Json(users.iter().map(UserResponse::from).collect()))
}

pub async fn get_user_by_email(State(state): State<AppState>, Path(email): Path<String>) -> Result<Json<UserResponse>> {
    let user = users::find_by_email(&state.pool, &email)
        .await?
        .ok_or_else(|| Error::NotFound("User not found".into()))?;
    Ok(Json(UserResponse::from(&user)))
}

pub async fn get_user(State(state): State<AppState>, Path(user_id): Path<i64>) -> Result<Json<UserDetailResponse>> {
    let user = users::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| Error::NotFound("User not found".into()))?;
    let tokens = users::tokens_for_user(&state.pool, user_id).await?;

    Ok(Json(UserDetailResponse {
        user: UserResponse::from(&user),
        api_tokens: tokens
            .into_iter()
            .map(|t| TokenResponse {
                id: t.id,
                token: t.token,
                user_id: t.user_id,
                created_at: t.created_at,
            })
            .collect(),
    }))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    Json(body): Json<UpdateUserBody>,
) -> Result<Json<UserResponse>> {
    let user = users::update_user(
        &state.pool,
        user_id,
        body.name.as_deref(),
        body.image_url.as_deref(),
        body.max_concurrent_bots,
    )
    .await?
    .ok_or_else(|| Error::NotFound("User not found".into()))?;

    Ok(Json(UserResponse::from(&user)))
}

pub async fn create_token(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
) -> Result<(StatusCode, Json<TokenResponse>)> {
    users::find_by_id(&state.pool, user_id)
        .await?
        .ok_or_else(|| Error::NotFound("User not found".into()))?;

    let token_value = generate_secure_token();
    let token = users::create_token(&state.pool, user_id, &token_value).await?;

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            id: token.id,
            token: token.token,
            user_id: token.user_id,
            created_at: token.created_at,
        }),
    ))
}

pub async fn delete_token(State(state): State<AppState>, Path(token_id): Path<i64>) -> Result<StatusCode> {
    let deleted = users::delete_token(&state.pool, token_id).await?;
    if !deleted {
        return Err(Error::NotFound("Token not found".into()));
    }
    Ok(StatusCode::NO_CONTENT)
}

pub async fn meetings_users_stats(
    State(state): State<AppState>,
    Query(page): Query<Pagination>,
) -> Result<Json<PaginatedMeetingUserStats>> {
    let total = users::count_meetings(&state.pool).await?;
    let rows = users::meetings_joined_with_users(&state.pool, page.limit, page.skip).await?;

    let items = rows
        .into_iter()
        .filter_map(|r| {
            Some(vexa_domain::wire::MeetingUserStatRow {
                meeting_id: r.meeting_id,
                user_id: r.user_id,
                user_email: r.user_email,
                platform: r.platform.parse().ok()?,
                status: r.status,
                created_at: r.created_at,
            })
        })
        .collect();

    Ok(Json(PaginatedMeetingUserStats { total, items }))
}
