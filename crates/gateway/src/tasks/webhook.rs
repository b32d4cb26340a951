//! Webhook post-meeting task, grounded in
//! `examples/original_source/services/bot--manager/app/tasks/bot_exit_tasks/send_webhook.py`:
//! posts the finished meeting to the user's configured `webhook_url`,
//! no-op if unset, logs (never retries) on failure.

use vexa_domain::error::Result;
use vexa_domain::wire::MeetingResponse;

use super::{PostMeetingTask, TaskContext};

pub struct WebhookTask;

#[async_trait::async_trait]
impl PostMeetingTask for WebhookTask {
    fn name(&self) -> &'static str {
        "send_webhook"
    }

    async fn run(&self, ctx: &TaskContext) -> Result<()> {
        let Some(webhook_url) = ctx.user.webhook_url() else {
            tracing::info!(meeting_id = ctx.meeting.id, user_id = ctx.user.id, "no webhook_url configured, skipping");
            return Ok(());
        };

        let payload = MeetingResponse {
            id: ctx.meeting.id,
            platform: ctx.meeting.platform,
            native_meeting_id: ctx.meeting.native_meeting_id.clone(),
            status: ctx.meeting.status.as_str().to_string(),
            created_at: ctx.meeting.created_at,
        };

        let response = ctx.http.post(webhook_url).json(&payload).send().await;
        match response {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!(meeting_id = ctx.meeting.id, webhook_url, "webhook delivered");
                Ok(())
            }
            Ok(resp) => {
                tracing::warn!(
                    meeting_id = ctx.meeting.id,
                    webhook_url,
                    status = %resp.status(),
                    "webhook endpoint returned non-success status"
                );
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, meeting_id = ctx.meeting.id, webhook_url, "failed to deliver webhook");
                Ok(())
            }
        }
    }
}
