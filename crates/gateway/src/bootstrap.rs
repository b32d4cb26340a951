//! AppState construction and background-task spawning, following the
//! teacher's `build_app_state`/`spawn_background_tasks` split
//! (`examples/sblanchard-SerialAgent/crates/gateway/src/bootstrap.rs`).

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use sha2::{Digest, Sha256};
use tokio_util::sync::CancellationToken;

use vexa_bus::Bus;
use vexa_domain::config::{Config, ConfigSeverity};
use vexa_domain::filter::TranscriptionFilter;
use vexa_driver::{BollardDriver, ContainerDriver};

use crate::state::AppState;
use crate::tasks;

pub async fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Relational store ──────────────────────────────────────────────
    let pool = vexa_store::connect(&config.database_url)
        .await
        .context("connecting to Postgres")?;
    tracing::info!("relational store ready");

    // ── Message bus ───────────────────────────────────────────────────
    let bus = Bus::connect(&config.redis_url)
        .await
        .context("connecting to Redis")?;
    bus.ping().await.context("pinging Redis")?;
    bus.ensure_consumer_group(&config.bus.transcription_stream, &config.bus.consumer_group)
        .await
        .context("ensuring transcription consumer group")?;
    bus.ensure_consumer_group(&config.bus.speaker_stream, &config.bus.speaker_consumer_group)
        .await
        .context("ensuring speaker consumer group")?;
    tracing::info!(
        transcription_stream = %config.bus.transcription_stream,
        speaker_stream = %config.bus.speaker_stream,
        "message bus ready"
    );

    // ── Container driver ──────────────────────────────────────────────
    let driver: Arc<dyn ContainerDriver> =
        Arc::new(BollardDriver::connect(config.docker_host.as_deref()).await?);
    tracing::info!("container driver ready");

    // ── Transcript filter ─────────────────────────────────────────────
    let filter = Arc::new(TranscriptionFilter::from_config(&config.filter));
    tracing::info!("transcript filter ready");

    // ── Admin token (hashed once for constant-time comparison) ───────
    let admin_token_hash: [u8; 32] = Sha256::digest(config.admin_api_token.as_bytes()).into();
    tracing::info!("admin token loaded");

    // ── Outbound HTTP client (post-meeting webhooks) ──────────────────
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()
        .context("building HTTP client")?;

    Ok(AppState {
        config,
        pool,
        bus,
        driver,
        filter,
        admin_token_hash,
        http,
        tasks: Arc::new(tasks::registry()),
        shutdown: CancellationToken::new(),
    })
}

/// Spawn the long-running background tasks: stream consumers, the
/// promotion sweep, and stale-message reclaim — the teacher's pattern of
/// one `tokio::spawn` + `tokio::time::interval` loop per subsystem.
pub fn spawn_background_tasks(state: &AppState) {
    {
        let state = state.clone();
        tokio::spawn(async move {
            crate::consumer::segments::run(state).await;
        });
    }

    {
        let state = state.clone();
        tokio::spawn(async move {
            crate::consumer::speaker::run(state).await;
        });
    }

    {
        let state = state.clone();
        let interval_secs = state.config.promoter.interval_secs;
        let shutdown = state.shutdown.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(interval_secs));
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(e) = crate::promoter::run_once(&state).await {
                            tracing::warn!(error = %e, "promotion sweep failed");
                        }
                    }
                }
            }
        });
    }

    {
        let state = state.clone();
        let shutdown = state.shutdown.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        crate::consumer::reclaim::run_once(&state).await;
                    }
                }
            }
        });
    }

    tracing::info!("background tasks spawned");
}
