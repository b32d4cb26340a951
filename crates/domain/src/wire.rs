//! External wire types, `spec.md` §6/§11.
//!
//! Field names for the bot-facing payloads (`BotConfig`) and the stream
//! messages are carried verbatim from
//! `examples/original_source/services/bot-manager/docker_utils.py` and
//! `examples/original_source/services/transcription-collector/streaming/processors.py`
//! so that external bot images and any already-running producers keep
//! working unchanged against this implementation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Platform;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Bot config env payload (C5 -> container, §11)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
pub struct AutomaticLeave {
    #[serde(rename = "waitingRoomTimeout")]
    pub waiting_room_timeout_ms: u64,
    #[serde(rename = "noOneJoinedTimeout")]
    pub no_one_joined_timeout_ms: u64,
    #[serde(rename = "everyoneLeftTimeout")]
    pub everyone_left_timeout_ms: u64,
}

impl Default for AutomaticLeave {
    fn default() -> Self {
        Self {
            waiting_room_timeout_ms: 300_000,
            no_one_joined_timeout_ms: 120_000,
            everyone_left_timeout_ms: 60_000,
        }
    }
}

/// Serialized as `BOT_CONFIG` into the bot container's environment. Field
/// names and casing are fixed by the original bot image's expectations, not
/// by this crate's own conventions — do not "fix" the mixed snake/camel
/// case here.
#[derive(Debug, Clone, Serialize)]
pub struct BotConfig {
    pub meeting_id: i64,
    pub platform: Platform,
    #[serde(rename = "meetingUrl", skip_serializing_if = "Option::is_none")]
    pub meeting_url: Option<String>,
    #[serde(rename = "botName")]
    pub bot_name: String,
    pub token: String,
    #[serde(rename = "nativeMeetingId")]
    pub native_meeting_id: String,
    #[serde(rename = "connectionId")]
    pub connection_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task: Option<String>,
    #[serde(rename = "redisUrl")]
    pub redis_url: String,
    #[serde(rename = "automaticLeave")]
    pub automatic_leave: AutomaticLeave,
    #[serde(rename = "botManagerCallbackUrl")]
    pub bot_manager_callback_url: String,
}

/// Inbound body for the bot's exit callback, `spec.md` §4.3.6.
#[derive(Debug, Clone, Deserialize)]
pub struct BotExitCallback {
    pub connection_id: String,
    pub exit_code: i32,
    #[serde(default = "default_exit_reason")]
    pub reason: String,
}

fn default_exit_reason() -> String {
    "self_initiated_leave".to_string()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Transcription stream (bot -> Redis stream, C6)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Raw stream entry: a single field named `payload` holding a JSON string,
/// decoded into one of the `StreamEvent` variants below by `type`.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamEnvelope {
    pub payload: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Transcription(TranscriptionEvent),
    SessionStart(SessionStartEvent),
    SessionEnd(SessionEndEvent),
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptionEvent {
    pub token: String,
    pub platform: Platform,
    /// Native (platform-specific) meeting id — field is literally called
    /// `meeting_id` on the wire even though it is not the internal id.
    pub meeting_id: String,
    pub uid: Option<String>,
    #[serde(default)]
    pub segments: Vec<RawSegment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RawSegment {
    pub start: f64,
    pub end: f64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionStartEvent {
    pub token: String,
    pub platform: Platform,
    pub meeting_id: String,
    pub uid: String,
    pub start_timestamp: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionEndEvent {
    pub token: String,
    pub platform: Platform,
    pub meeting_id: String,
    pub uid: String,
}

/// Cached per-segment state held in the `meeting:<id>:segments` Redis hash,
/// keyed by a `"{start:.3}"`-formatted field name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedSegment {
    pub text: String,
    pub end_time: f64,
    pub language: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub session_uid: Option<String>,
    pub speaker: Option<String>,
    pub speaker_mapping_status: SpeakerMappingStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpeakerMappingStatus {
    Unknown,
    Mapped,
    Multiple,
    NoSpeakerEvents,
    Error,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Speaker events (bot -> Redis stream, §4.6 supplemental speaker mapping)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpeakerEventType {
    SpeakerStart,
    SpeakerEnd,
}

/// Raw speaker-event stream entry. `uid` identifies the session the event
/// belongs to (the sorted-set key), separate from `speaker_map`'s
/// already-parsed `ParsedEvent`, which is scoped to one session and has no
/// need to carry it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeakerEvent {
    pub uid: String,
    pub event_type: SpeakerEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<String>,
    pub participant_name: String,
    #[serde(rename = "relative_client_timestamp_ms")]
    pub relative_timestamp_ms: f64,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// REST request/response bodies (C5/C8/§10, snake_case)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Deserialize)]
pub struct RequestBotBody {
    pub platform: Platform,
    pub native_meeting_id: String,
    #[serde(default)]
    pub bot_name: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub task: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeetingResponse {
    pub id: i64,
    pub platform: Platform,
    pub native_meeting_id: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMeetingConfigBody {
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub task: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptSegmentResponse {
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    pub language: Option<String>,
    pub speaker: Option<String>,
    pub absolute_start_time: DateTime<Utc>,
    pub absolute_end_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TranscriptResponse {
    pub meeting_id: i64,
    pub platform: Platform,
    pub native_meeting_id: String,
    pub status: String,
    pub segments: Vec<TranscriptSegmentResponse>,
}

/// `202 Accepted` body shape shared by stop/reconfigure, matching the
/// original's plain `{"message": ...}` response.
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunningBot {
    pub meeting_id: i64,
    pub platform: Platform,
    pub native_meeting_id: String,
    pub container_id: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BotStatusResponse {
    pub running_bots: Vec<RunningBot>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Admin/user surface (§10)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserBody {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub max_concurrent_bots: Option<i32>,
}

/// Outward-facing user shape: exposes `webhook_url` as its own field instead
/// of leaking the raw `data` JSONB column.
#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub max_concurrent_bots: i32,
    pub webhook_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&crate::model::User> for UserResponse {
    fn from(user: &crate::model::User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            image_url: user.image_url.clone(),
            max_concurrent_bots: user.max_concurrent_bots,
            webhook_url: user.webhook_url().map(str::to_string),
            created_at: user.created_at,
        }
    }
}

/// `GET /admin/users/{id}` response: a user with its API tokens eagerly
/// embedded, matching the original's `selectinload(User.api_tokens)`.
#[derive(Debug, Clone, Serialize)]
pub struct UserDetailResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub api_tokens: Vec<TokenResponse>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaginatedMeetingUserStats {
    pub total: i64,
    pub items: Vec<MeetingUserStatRow>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserBody {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub max_concurrent_bots: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub id: i64,
    pub token: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SetWebhookBody {
    pub webhook_url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeetingUserStatRow {
    pub meeting_id: i64,
    pub user_id: i64,
    pub user_email: String,
    pub platform: Platform,
    pub status: String,
    pub created_at: DateTime<Utc>,
}
