//! Price history listing.

use console::style;

use crate::config::Settings;

/// Print stored records, newest first.
pub async fn cmd_history(settings: &Settings, limit: i64, multi: bool) -> anyhow::Result<()> {
    let repo = super::super::open_repository(settings).await?;
    let limit = limit.max(1);

    if multi {
        let records = repo
            .latest_multi(limit)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read history: {}", e))?;

        if records.is_empty() {
            println!("{} No multi-source records stored yet", style("!").yellow());
            return Ok(());
        }

        for record in records {
            println!(
                "\n{} {}",
                style(record.created_at.format("%Y-%m-%d %H:%M:%S")).bold(),
                style(format!("({})", record.time_period)).dim()
            );
            for (field, price) in &record.prices {
                println!("  {:<20} {:>12.2} {}", field, price.price, price.currency);
            }
        }
        return Ok(());
    }

    let records = repo
        .latest(limit)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to read history: {}", e))?;

    if records.is_empty() {
        println!("{} No records stored yet", style("!").yellow());
        return Ok(());
    }

    println!("\n{}", style("Price History").bold());
    println!("{}", "-".repeat(70));
    println!(
        "{:<20} {:>12} {:<5} {:<8} Source",
        "Captured", "Price", "Cur", "Period"
    );
    println!("{}", "-".repeat(70));

    for record in records {
        println!(
            "{:<20} {:>12.2} {:<5} {:<8} {}",
            record.created_at.format("%Y-%m-%d %H:%M:%S"),
            record.price,
            record.currency,
            record.time_period,
            record.source
        );
    }

    Ok(())
}
