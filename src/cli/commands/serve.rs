//! API server command with the cron scheduler.

use std::net::SocketAddr;
use std::sync::Arc;

use console::style;
use tracing::info;

use crate::config::Settings;
use crate::server::{create_router, AppState};
use crate::services::ScrapeService;

/// Start the API server and, unless disabled, the cron scheduler.
///
/// Startup gate: the database connection and a browser launch are both
/// verified before anything is scheduled; either failure aborts startup.
pub async fn cmd_serve(
    settings: &Settings,
    host: Option<String>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| settings.server.host.clone());
    let port = port.unwrap_or(settings.server.port);

    println!("{} Preparing database...", style("→").cyan());
    let repo = super::super::open_repository(settings).await?;
    if !repo.test_connection().await {
        eprintln!("  {} Database connection test failed", style("✗").red());
        anyhow::bail!("database connection test failed");
    }
    println!("  {} Database ready", style("✓").green());

    let service = Arc::new(ScrapeService::new(settings, repo));

    println!("{} Checking browser launch...", style("→").cyan());
    if let Err(e) = service.ensure_ready(settings.schedule.mode).await {
        eprintln!("  {} Browser self-test failed: {}", style("✗").red(), e);
        service.shutdown().await;
        return Err(e.into());
    }
    println!("  {} Browser ready", style("✓").green());

    let scheduler = if settings.schedule.enabled {
        Some(crate::scheduler::start(&settings.schedule, service.clone()).await?)
    } else {
        println!("  {} Scheduler disabled in config", style("!").yellow());
        None
    };

    let state = AppState::new(service.clone(), settings.schedule.mode);
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address {}:{}: {}", host, port, e))?;

    println!(
        "{} Starting PriceWatch server at http://{}",
        style("→").cyan(),
        addr
    );
    println!("  Press Ctrl+C to stop");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped, shutting down");
    if let Some(scheduler) = scheduler {
        scheduler.shutdown().await;
    }
    service.shutdown().await;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}
