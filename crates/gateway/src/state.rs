use std::sync::Arc;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;
use vexa_auth::AuthState;
use vexa_bus::Bus;
use vexa_domain::config::Config;
use vexa_domain::filter::TranscriptionFilter;
use vexa_driver::ContainerDriver;

use crate::tasks::PostMeetingTask;

/// Shared application state, constructed once in `bootstrap::build_app_state`
/// and cloned (cheaply, behind `Arc`) into every request handler and
/// background task — the same shape the teacher's `AppState` takes.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pool: PgPool,
    pub bus: Bus,
    pub driver: Arc<dyn ContainerDriver>,
    pub filter: Arc<TranscriptionFilter>,
    pub admin_token_hash: [u8; 32],
    pub http: reqwest::Client,
    pub tasks: Arc<Vec<Box<dyn PostMeetingTask>>>,
    pub shutdown: CancellationToken,
}

impl AuthState for AppState {
    fn admin_token_hash(&self) -> &[u8; 32] {
        &self.admin_token_hash
    }

    fn pool(&self) -> &PgPool {
        &self.pool
    }
}
