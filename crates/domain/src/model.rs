use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;

/// Conferencing platform a bot can be dispatched into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    GoogleMeet,
    Zoom,
    Teams,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::GoogleMeet => "google_meet",
            Platform::Zoom => "zoom",
            Platform::Teams => "teams",
        }
    }
}

impl std::str::FromStr for Platform {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google_meet" => Ok(Platform::GoogleMeet),
            "zoom" => Ok(Platform::Zoom),
            "teams" => Ok(Platform::Teams),
            other => Err(crate::error::Error::Validation(format!(
                "unknown platform: {other}"
            ))),
        }
    }
}

/// Meeting lifecycle state, `spec.md` §3/§4.3.6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MeetingStatus {
    Requested,
    Active,
    Stopping,
    Completed,
    Failed,
    Error,
}

impl MeetingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MeetingStatus::Requested => "requested",
            MeetingStatus::Active => "active",
            MeetingStatus::Stopping => "stopping",
            MeetingStatus::Completed => "completed",
            MeetingStatus::Failed => "failed",
            MeetingStatus::Error => "error",
        }
    }

    /// Terminal states are never overwritten by further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MeetingStatus::Completed | MeetingStatus::Failed | MeetingStatus::Error
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: Option<String>,
    pub image_url: Option<String>,
    pub max_concurrent_bots: i32,
    pub data: Value,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn webhook_url(&self) -> Option<&str> {
        self.data.get("webhook_url").and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ApiToken {
    pub id: i64,
    pub token: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Meeting {
    pub id: i64,
    pub user_id: i64,
    pub platform: Platform,
    pub native_meeting_id: String,
    pub status: MeetingStatus,
    pub bot_container_id: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub data: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MeetingSession {
    pub id: i64,
    pub meeting_id: i64,
    pub session_uid: String,
    pub session_start_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Transcription {
    pub id: i64,
    pub meeting_id: i64,
    pub session_uid: String,
    pub start_time: f64,
    pub end_time: f64,
    pub text: String,
    pub language: Option<String>,
    pub speaker: Option<String>,
    pub created_at: DateTime<Utc>,
}
