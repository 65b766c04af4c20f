//! Database status command.

use console::style;

use crate::config::Settings;

/// Show database connectivity and stored record counts.
pub async fn cmd_status(settings: &Settings) -> anyhow::Result<()> {
    let repo = super::super::open_repository(settings).await?;

    println!("\n{}", style("PriceWatch Status").bold());
    println!("{}", "-".repeat(40));
    println!("{:<20} {}", "Database:", settings.database_path.display());

    if !repo.test_connection().await {
        println!("{:<20} {}", "Connection:", style("✗ failed").red());
        anyhow::bail!("database connection test failed");
    }
    println!("{:<20} {}", "Connection:", style("✓ ok").green());

    let count = repo
        .count()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to count records: {}", e))?;
    println!("{:<20} {}", "Price records:", count);

    if let Ok(latest) = repo.latest(1).await {
        if let Some(record) = latest.first() {
            println!(
                "{:<20} {} {} at {}",
                "Latest:",
                record.price,
                record.currency,
                record.created_at.format("%Y-%m-%d %H:%M:%S")
            );
        }
    }

    Ok(())
}
