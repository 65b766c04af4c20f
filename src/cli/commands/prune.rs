//! Record retention command.

use console::style;

use crate::config::Settings;

/// Delete records older than `days` days from both tables.
pub async fn cmd_prune(settings: &Settings, days: i64) -> anyhow::Result<()> {
    if days < 1 {
        anyhow::bail!("days must be at least 1");
    }

    let repo = super::super::open_repository(settings).await?;
    let before = repo
        .count()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to count records: {}", e))?;

    if !repo.delete_older_than(days).await {
        println!("{} Prune failed", style("✗").red());
        anyhow::bail!("prune failed");
    }

    let after = repo.count().await.unwrap_or(before);
    println!(
        "{} Deleted {} records older than {} days ({} remaining)",
        style("✓").green(),
        before - after,
        days,
        after
    );

    Ok(())
}
