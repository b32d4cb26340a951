//! Bot lifecycle endpoints (C5), `spec.md` §4.3, grounded in
//! `examples/original_source/services/bot-manager/main.py` and
//! `docker_utils.py`'s `start_bot_container`/`stop_bot_container`/
//! `get_running_bots_status`.

use std::collections::HashSet;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use chrono::Utc;

use vexa_domain::error::{Error, Result};
use vexa_domain::model::{MeetingStatus, Platform, User};
use vexa_domain::platform::{construct_meeting_url, validate_native_id};
use vexa_domain::trace::TraceEvent;
use vexa_domain::wire::{
    BotConfig, BotExitCallback, BotStatusResponse, MeetingResponse, MessageResponse,
    RequestBotBody, RunningBot, UpdateMeetingConfigBody,
};
use vexa_driver::ContainerSpec;
use vexa_store::{meetings, sessions};

use crate::state::AppState;

pub async fn request_bot(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    headers: HeaderMap,
    Json(body): Json<RequestBotBody>,
) -> Result<(StatusCode, Json<MeetingResponse>)> {
    let user_token = headers
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    validate_native_id(body.platform, &body.native_meeting_id)?;
    let constructed_url = construct_meeting_url(body.platform, &body.native_meeting_id);

    let existing = meetings::find_occupying(&state.pool, user.id, body.platform, &body.native_meeting_id).await?;

    let mut reconciled_old_meeting_id = None;
    if let Some(existing) = existing {
        match &existing.bot_container_id {
            Some(container_id) if state.driver.is_running(container_id).await? => {
                return Err(Error::Conflict(format!(
                    "An active or requested meeting already exists for this platform and meeting ID, and its container is running. Meeting ID: {}",
                    existing.id
                )));
            }
            _ => {
                meetings::set_ended(&state.pool, existing.id, MeetingStatus::Failed, Utc::now()).await?;
                reconciled_old_meeting_id = Some(existing.id);
            }
        }
    }

    let running = state.driver.list_running_for_user(user.id).await?;
    if running.len() as i32 >= user.max_concurrent_bots {
        TraceEvent::BotAdmissionRejected {
            user_id: user.id,
            running: running.len(),
            max_concurrent: user.max_concurrent_bots,
        }
        .emit();
        return Err(Error::Limit(format!(
            "User has reached the maximum concurrent bot limit ({}).",
            user.max_concurrent_bots
        )));
    }

    let meeting = meetings::create_meeting(&state.pool, user.id, body.platform, &body.native_meeting_id).await?;
    TraceEvent::BotRequested {
        meeting_id: meeting.id,
        user_id: user.id,
        platform: body.platform.as_str().to_string(),
        native_meeting_id: body.native_meeting_id.clone(),
    }
    .emit();
    if let Some(old_meeting_id) = reconciled_old_meeting_id {
        TraceEvent::BotDuplicateReconciled {
            old_meeting_id,
            new_meeting_id: meeting.id,
            container_was_running: false,
        }
        .emit();
    }

    let bot_name = body
        .bot_name
        .clone()
        .unwrap_or_else(|| format!("VexaBot-{}", &uuid::Uuid::new_v4().simple().to_string()[..6]));
    let connection_id = uuid::Uuid::new_v4().to_string();
    let container_name = format!(
        "vexa-bot-{}-{}",
        meeting.id,
        &uuid::Uuid::new_v4().simple().to_string()[..8]
    );

    let bot_config = BotConfig {
        meeting_id: meeting.id,
        platform: body.platform,
        meeting_url: constructed_url,
        bot_name,
        token: user_token,
        native_meeting_id: body.native_meeting_id.clone(),
        connection_id: connection_id.clone(),
        language: body.language.clone(),
        task: body.task.clone(),
        redis_url: state.config.redis_url.clone(),
        automatic_leave: Default::default(),
        bot_manager_callback_url: format!(
            "{}/bots/internal/callback/exited",
            state.config.exit_callback_base_url.trim_end_matches('/')
        ),
    };
    let bot_config_json = serde_json::to_string(&bot_config)?;

    let mut env = vec![format!("BOT_CONFIG={bot_config_json}")];
    if let Ok(whisper_live_url) = std::env::var("WHISPER_LIVE_URL") {
        env.push(format!("WHISPER_LIVE_URL={whisper_live_url}"));
    }
    env.push(format!(
        "LOG_LEVEL={}",
        std::env::var("LOG_LEVEL").unwrap_or_else(|_| "INFO".into()).to_uppercase()
    ));

    let spec = ContainerSpec {
        name: container_name,
        image: state.config.bot_image.clone(),
        env,
        network: state.config.bot_network.clone(),
        user_id: user.id,
        meeting_id: meeting.id,
    };

    let container_id = match state.driver.create_and_start(spec).await {
        Ok(id) => id,
        Err(e) => {
            meetings::set_status(&state.pool, meeting.id, MeetingStatus::Error).await?;
            return Err(e);
        }
    };

    tokio::spawn({
        let pool = state.pool.clone();
        let connection_id = connection_id.clone();
        let meeting_id = meeting.id;
        let session_start_time = Utc::now();
        async move {
            match sessions::upsert_session_start(&pool, meeting_id, &connection_id, session_start_time).await {
                Ok(overwritten) => TraceEvent::SessionStartRecorded {
                    session_uid: connection_id,
                    session_start_time,
                    overwritten,
                }
                .emit(),
                Err(e) => tracing::warn!(error = %e, meeting_id, "failed to record session start"),
            }
        }
    });

    meetings::set_container_started(&state.pool, meeting.id, &container_id, Utc::now()).await?;
    TraceEvent::BotStarted {
        meeting_id: meeting.id,
        container_id: container_id.clone(),
    }
    .emit();

    Ok((
        StatusCode::CREATED,
        Json(MeetingResponse {
            id: meeting.id,
            platform: body.platform,
            native_meeting_id: body.native_meeting_id,
            status: MeetingStatus::Active.as_str().to_string(),
            created_at: meeting.created_at,
        }),
    ))
}

pub async fn reconfigure_bot(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path((platform, native_meeting_id)): Path<(Platform, String)>,
    Json(body): Json<UpdateMeetingConfigBody>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let latest = meetings::find_latest(&state.pool, user.id, platform, &native_meeting_id).await?;

    let meeting = match latest {
        Some(m) if m.status == MeetingStatus::Active => m,
        Some(m) => {
            return Err(Error::Conflict(format!(
                "Meeting found but is not active (status: '{}'). Cannot reconfigure.",
                m.status.as_str()
            )));
        }
        None => {
            return Err(Error::NotFound(format!(
                "No active meeting found for platform {} and meeting ID {native_meeting_id}.",
                platform.as_str()
            )));
        }
    };

    let session = sessions::earliest_session(&state.pool, meeting.id)
        .await?
        .ok_or_else(|| {
            Error::Conflict("Meeting is active but session information is missing. Cannot process reconfiguration.".into())
        })?;

    let command = serde_json::json!({
        "action": "reconfigure",
        "uid": session.session_uid,
        "language": body.language,
        "task": body.task,
    });
    state
        .bus
        .publish_bot_command(&session.session_uid, &command.to_string())
        .await?;
    meetings::update_config(&state.pool, meeting.id, body.language.as_deref(), body.task.as_deref()).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "Reconfiguration request accepted and sent to the bot.".to_string(),
        }),
    ))
}

pub async fn stop_bot(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path((platform, native_meeting_id)): Path<(Platform, String)>,
) -> Result<(StatusCode, Json<MessageResponse>)> {
    let latest = meetings::find_latest(&state.pool, user.id, platform, &native_meeting_id).await?;

    let meeting = match latest {
        Some(m) if m.status == MeetingStatus::Active => m,
        _ => return Err(Error::NotFound("Active meeting not found.".into())),
    };

    let Some(container_id) = meeting.bot_container_id.clone() else {
        meetings::set_status(&state.pool, meeting.id, MeetingStatus::Error).await?;
        return Err(Error::Conflict("Meeting found but has no associated container.".into()));
    };

    let Some(session) = sessions::earliest_session(&state.pool, meeting.id).await? else {
        meetings::set_status(&state.pool, meeting.id, MeetingStatus::Error).await?;
        return Err(Error::Unrecoverable("Internal state error: Meeting session UID not found.".into()));
    };

    if let Err(e) = state
        .bus
        .publish_bot_command(&session.session_uid, &serde_json::json!({"action": "leave"}).to_string())
        .await
    {
        tracing::warn!(error = %e, meeting_id = meeting.id, "failed to publish leave command, proceeding with delayed stop anyway");
    }

    TraceEvent::BotStopRequested {
        meeting_id: meeting.id,
        session_uid: session.session_uid,
        delay_secs: 30,
    }
    .emit();
    tokio::spawn({
        let driver = state.driver.clone();
        async move {
            tokio::time::sleep(std::time::Duration::from_secs(30)).await;
            if let Err(e) = driver.stop(&container_id).await {
                tracing::warn!(error = %e, container_id, "delayed stop failed");
            }
        }
    });

    meetings::set_status(&state.pool, meeting.id, MeetingStatus::Stopping).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            message: "Stop request accepted and is being processed.".to_string(),
        }),
    ))
}

pub async fn bot_status(State(state): State<AppState>, Extension(user): Extension<User>) -> Result<Json<BotStatusResponse>> {
    let running: HashSet<String> = state
        .driver
        .list_running_for_user(user.id)
        .await?
        .into_iter()
        .map(|c| c.id)
        .collect();

    let running_bots = meetings::list_active_for_user(&state.pool, user.id)
        .await?
        .into_iter()
        .filter_map(|m| {
            let container_id = m.bot_container_id?;
            if !running.contains(&container_id) {
                return None;
            }
            Some(RunningBot {
                meeting_id: m.id,
                platform: m.platform,
                native_meeting_id: m.native_meeting_id,
                container_id,
                status: m.status.as_str().to_string(),
            })
        })
        .collect();

    Ok(Json(BotStatusResponse { running_bots }))
}

pub async fn exit_callback(State(state): State<AppState>, Json(payload): Json<BotExitCallback>) -> Json<serde_json::Value> {
    let session = match sessions::find_by_session_uid(&state.pool, &payload.connection_id).await {
        Ok(Some(s)) => s,
        Ok(None) => {
            tracing::error!(connection_id = payload.connection_id, "exit callback: meeting session not found");
            return Json(serde_json::json!({"status": "error", "detail": "Meeting session not found"}));
        }
        Err(e) => {
            tracing::error!(error = %e, "exit callback: failed to look up session");
            return Json(serde_json::json!({"status": "error", "detail": "internal error"}));
        }
    };

    let meeting = match meetings::find_by_id(&state.pool, session.meeting_id).await {
        Ok(Some(m)) => m,
        Ok(None) => {
            tracing::error!(meeting_id = session.meeting_id, "exit callback: meeting not found");
            return Json(serde_json::json!({"status": "error", "detail": format!("Meeting {} not found", session.meeting_id)}));
        }
        Err(e) => {
            tracing::error!(error = %e, "exit callback: failed to look up meeting");
            return Json(serde_json::json!({"status": "error", "detail": "internal error"}));
        }
    };

    if meeting.status.is_terminal() {
        tracing::info!(meeting_id = meeting.id, status = meeting.status.as_str(), "exit callback: meeting already finalized, ignoring duplicate");
        return Json(serde_json::json!({
            "status": "callback processed",
            "meeting_id": meeting.id,
            "final_status": meeting.status.as_str(),
        }));
    }

    let new_status = if payload.exit_code == 0 {
        MeetingStatus::Completed
    } else {
        MeetingStatus::Failed
    };
    if let Err(e) = meetings::set_ended(&state.pool, meeting.id, new_status, Utc::now()).await {
        tracing::error!(error = %e, meeting_id = meeting.id, "exit callback: failed to update meeting status");
        return Json(serde_json::json!({"status": "error", "detail": "An internal error occurred while processing the bot exit callback."}));
    }
    TraceEvent::BotExited {
        meeting_id: meeting.id,
        exit_code: payload.exit_code,
        status: new_status.as_str().to_string(),
    }
    .emit();

    tokio::spawn({
        let pool = state.pool.clone();
        let http = state.http.clone();
        let tasks = state.tasks.clone();
        async move {
            crate::tasks::run_all(&pool, &http, &tasks, meeting.id).await;
        }
    });

    if payload.exit_code != 0 {
        if let Some(container_id) = meeting.bot_container_id.clone() {
            TraceEvent::BotStopRequested {
                meeting_id: meeting.id,
                session_uid: payload.connection_id,
                delay_secs: 10,
            }
            .emit();
            tokio::spawn({
                let driver = state.driver.clone();
                async move {
                    tokio::time::sleep(std::time::Duration::from_secs(10)).await;
                    if let Err(e) = driver.stop(&container_id).await {
                        tracing::warn!(error = %e, container_id, "delayed safeguard stop failed");
                    }
                }
            });
        }
    }

    Json(serde_json::json!({
        "status": "callback processed",
        "meeting_id": meeting.id,
        "final_status": new_status.as_str(),
    }))
}
