//! Cron-driven scrape scheduling.
//!
//! Wraps tokio-cron-scheduler: one job fires [`ScrapeService::run_once`]
//! on the configured cron expression (evaluated in the configured
//! timezone), plus a periodic status heartbeat that logs the stored row
//! count so long-running deployments show signs of life in the logs.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::config::ScheduleConfig;
use crate::services::ScrapeService;

/// A running scheduler. Dropping it without calling
/// [`shutdown`](Self::shutdown) leaves the cron job running until the
/// process exits.
pub struct SchedulerHandle {
    scheduler: JobScheduler,
    heartbeat_stop: watch::Sender<bool>,
    heartbeat_task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Stop the heartbeat and the cron scheduler.
    pub async fn shutdown(mut self) {
        let _ = self.heartbeat_stop.send(true);
        if let Err(e) = self.heartbeat_task.await {
            if !e.is_cancelled() {
                warn!("Status heartbeat task panicked: {}", e);
            }
        }
        if let Err(e) = self.scheduler.shutdown().await {
            warn!("Scheduler shutdown failed: {}", e);
        }
        info!("Scheduler stopped");
    }
}

/// Start the cron scheduler for the given service.
///
/// When `run_on_start` is set, one run is kicked off immediately in the
/// background rather than waiting for the first cron tick.
pub async fn start(config: &ScheduleConfig, service: Arc<ScrapeService>) -> Result<SchedulerHandle> {
    let timezone: chrono_tz::Tz = config
        .timezone
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid schedule.timezone {:?}: {}", config.timezone, e))?;
    let mode = config.mode;

    let scheduler = JobScheduler::new()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create scheduler: {}", e))?;

    let job_service = service.clone();
    let job = Job::new_async_tz(config.cron.as_str(), timezone, move |_uuid, _lock| {
        let service = job_service.clone();
        Box::pin(async move {
            match service.run_once(mode).await {
                Ok(outcome) if outcome.persisted() => {
                    info!("Scheduled run complete: {}", outcome.primary_price());
                }
                Ok(_) => error!("Scheduled run scraped but could not save"),
                Err(e) => error!("Scheduled run failed: {}", e),
            }
        })
    })
    .map_err(|e| anyhow::anyhow!("Invalid cron expression {:?}: {}", config.cron, e))?;

    scheduler
        .add(job)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to register cron job: {}", e))?;
    scheduler
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start scheduler: {}", e))?;

    info!(
        "Scheduler started (cron {:?}, timezone {}, mode {})",
        config.cron, timezone, mode
    );

    if config.run_on_start {
        let service = service.clone();
        tokio::spawn(async move {
            info!("Running initial scrape before first cron tick");
            match service.run_once(mode).await {
                Ok(outcome) if outcome.persisted() => {
                    info!("Initial run complete: {}", outcome.primary_price());
                }
                Ok(_) => error!("Initial run scraped but could not save"),
                Err(e) => error!("Initial run failed: {}", e),
            }
        });
    }

    let (heartbeat_stop, heartbeat_rx) = watch::channel(false);
    let heartbeat_task = tokio::spawn(heartbeat_loop(
        service,
        Duration::from_secs(config.status_interval_secs.max(1)),
        heartbeat_rx,
    ));

    Ok(SchedulerHandle {
        scheduler,
        heartbeat_stop,
        heartbeat_task,
    })
}

/// Log the stored record count at a fixed interval until told to stop.
async fn heartbeat_loop(
    service: Arc<ScrapeService>,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    // First tick fires immediately; skip it so the startup logs stay clean
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match service.repo().count().await {
                    Ok(count) => info!("Status: {} price records stored", count),
                    Err(e) => warn!("Status check failed: {}", e),
                }
            }
            changed = stop.changed() => {
                if changed.is_err() || *stop.borrow() {
                    break;
                }
            }
        }
    }
}
