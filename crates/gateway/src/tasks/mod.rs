//! Post-meeting task runner (C9), `spec.md` §4.7.
//!
//! REDESIGN FLAG per `spec.md` §9: the original's directory-scan/dynamic
//! import (`bot_exit_tasks/*.py` auto-discovered at startup) is replaced by
//! a static registry built once at startup — no filesystem scanning, no
//! dynamic dispatch beyond the `dyn PostMeetingTask` trait object itself.

pub mod webhook;

use sqlx::PgPool;
use vexa_domain::model::{Meeting, User};

/// Everything a post-meeting task needs to do its job.
pub struct TaskContext {
    pub pool: PgPool,
    pub http: reqwest::Client,
    pub meeting: Meeting,
    pub user: User,
}

#[async_trait::async_trait]
pub trait PostMeetingTask: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, ctx: &TaskContext) -> vexa_domain::error::Result<()>;
}

/// The fixed set of tasks run after every meeting ends, in order.
pub fn registry() -> Vec<Box<dyn PostMeetingTask>> {
    vec![Box::new(webhook::WebhookTask)]
}

/// Runs every registered task for a finished meeting, logging (not
/// propagating) each task's own failure so one bad task cannot block the
/// others — matches the original's `run_all_tasks` sweep over its
/// auto-discovered task modules.
pub async fn run_all(pool: &PgPool, http: &reqwest::Client, tasks: &[Box<dyn PostMeetingTask>], meeting_id: i64) {
    let meeting = match vexa_store::meetings::find_by_id(pool, meeting_id).await {
        Ok(Some(m)) => m,
        Ok(None) => {
            tracing::warn!(meeting_id, "post-meeting tasks: meeting not found");
            return;
        }
        Err(e) => {
            tracing::warn!(error = %e, meeting_id, "post-meeting tasks: failed to load meeting");
            return;
        }
    };
    let user = match vexa_store::users::find_by_id(pool, meeting.user_id).await {
        Ok(Some(u)) => u,
        Ok(None) => {
            tracing::warn!(meeting_id, user_id = meeting.user_id, "post-meeting tasks: user not found");
            return;
        }
        Err(e) => {
            tracing::warn!(error = %e, meeting_id, "post-meeting tasks: failed to load user");
            return;
        }
    };

    let ctx = TaskContext {
        pool: pool.clone(),
        http: http.clone(),
        meeting,
        user,
    };

    for task in tasks {
        let result = task.run(&ctx).await;
        let ok = result.is_ok();
        if let Err(e) = result {
            tracing::warn!(error = %e, task = task.name(), meeting_id, "post-meeting task failed");
        }
        vexa_domain::trace::TraceEvent::PostMeetingTaskRun {
            meeting_id,
            task: task.name().to_string(),
            ok,
        }
        .emit();
    }
}
