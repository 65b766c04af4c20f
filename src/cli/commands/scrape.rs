//! Manual scrape command.

use console::style;

use crate::config::{ScrapeMode, Settings};
use crate::services::{ScrapeOutcome, ScrapeService};

/// Run one scrape-and-persist cycle and print the result.
pub async fn cmd_scrape(settings: &Settings, mode: Option<ScrapeMode>) -> anyhow::Result<()> {
    let mode = mode.unwrap_or(settings.schedule.mode);
    let repo = super::super::open_repository(settings).await?;
    let service = ScrapeService::new(settings, repo);

    println!(
        "{} Scraping in {} mode...",
        style("→").cyan(),
        style(mode).bold()
    );

    let result = service.run_once(mode).await;
    service.shutdown().await;

    match result {
        Ok(outcome) => {
            match &outcome {
                ScrapeOutcome::Single { observation, .. } => {
                    println!(
                        "{} {} {} ({})",
                        style("✓").green(),
                        observation.price,
                        observation.currency,
                        observation.source_url
                    );
                }
                ScrapeOutcome::Multi { observation, .. } => {
                    for (field, price) in &observation.prices {
                        let marker = if *field == observation.primary_field {
                            style("*").yellow().to_string()
                        } else {
                            " ".to_string()
                        };
                        println!(
                            "{} {}{:<20} {} {}",
                            style("✓").green(),
                            marker,
                            field,
                            price.price,
                            price.currency
                        );
                    }
                }
            }

            if outcome.persisted() {
                println!("  {} Saved to database", style("✓").green());
                Ok(())
            } else {
                println!("  {} Scraped but could not save", style("✗").red());
                anyhow::bail!("record could not be saved")
            }
        }
        Err(e) => {
            println!("{} Scrape failed: {}", style("✗").red(), e);
            Err(e.into())
        }
    }
}
