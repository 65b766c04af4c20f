//! Multi-source scrape flow.
//!
//! Sources are processed strictly in configured order on one shared page;
//! individual source failures are tolerated and the batch only fails when
//! every source does. A retry re-runs the whole source list.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::Page;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{parse_price, validate_price, with_retry, ScrapeError};
use crate::browser::BrowserSession;
use crate::config::{MultiScrapeConfig, ScraperConfig, SourceConfig};
use crate::extract;
use crate::models::{MultiSourceObservation, SourcePrice};

/// Scrapes an ordered list of sources into one composite observation.
pub struct MultiSourceScraper {
    session: Mutex<BrowserSession>,
    scraper: ScraperConfig,
    config: MultiScrapeConfig,
    screenshot_dir: PathBuf,
}

impl MultiSourceScraper {
    pub fn new(scraper: ScraperConfig, config: MultiScrapeConfig, screenshot_dir: PathBuf) -> Self {
        Self {
            session: Mutex::new(BrowserSession::new(scraper.clone())),
            scraper,
            config,
            screenshot_dir,
        }
    }

    /// Launch the browser if needed; used as a startup self-test.
    pub async fn ensure_ready(&self) -> Result<(), ScrapeError> {
        self.session
            .lock()
            .await
            .ensure_session()
            .await
            .map_err(|e| ScrapeError::Session(e.to_string()))
    }

    /// Run the batch through the retry engine.
    pub async fn scrape(&self) -> Result<MultiSourceObservation, ScrapeError> {
        // A missing source list is a configuration error, not retried
        if self.config.sources.is_empty() {
            return Err(ScrapeError::Config(
                "multi.sources must list at least one source".into(),
            ));
        }
        for source in &self.config.sources {
            url::Url::parse(&source.url).map_err(|e| {
                ScrapeError::Config(format!("source {:?} url {:?}: {}", source.name, source.url, e))
            })?;
        }

        if self.config.parallel {
            warn!("Parallel multi-source scraping is unsupported; falling back to sequential");
        }

        with_retry(
            || self.scrape_batch(),
            self.scraper.retry_count,
            Duration::from_millis(self.scraper.retry_delay_ms),
        )
        .await
    }

    /// One batch attempt over all sources, on one shared page that is
    /// closed whether the batch completes or errors.
    async fn scrape_batch(&self) -> Result<MultiSourceObservation, ScrapeError> {
        let page = {
            let mut session = self.session.lock().await;
            session
                .new_page()
                .await
                .map_err(|e| ScrapeError::Session(e.to_string()))?
        };

        let results = self.visit_sources(&page).await;

        if results.is_empty() {
            if let Err(e) =
                extract::capture_screenshot(&page, &self.screenshot_dir, "multi_scrape_failure")
                    .await
            {
                warn!("Screenshot capture failed: {}", e);
            }
        }

        if let Err(e) = page.close().await {
            warn!("Failed to close page: {}", e);
        }

        assemble_observation(&self.config.sources, results, &self.config.time_period)
    }

    /// Visit each source in configured order, collecting the successes.
    async fn visit_sources(&self, page: &Page) -> Vec<(String, SourcePrice)> {
        let mut results = Vec::new();
        let source_count = self.config.sources.len();

        for (index, source) in self.config.sources.iter().enumerate() {
            match self.scrape_source(page, source).await {
                Ok(price) => {
                    info!(
                        "Source {:?} ({}): {} {}",
                        source.name, source.field_name, price.price, price.currency
                    );
                    results.push((source.field_name.clone(), price));
                }
                Err(e) => {
                    // One bad source must not abort the batch
                    warn!("Source {:?} failed: {}; continuing", source.name, e);
                }
            }

            if index + 1 < source_count {
                tokio::time::sleep(Duration::from_millis(self.config.inter_source_delay_ms)).await;
            }
        }

        results
    }

    async fn scrape_source(
        &self,
        page: &Page,
        source: &SourceConfig,
    ) -> Result<SourcePrice, ScrapeError> {
        extract::navigate(page, &source.url, self.scraper.timeout_ms).await?;
        crate::browser::apply_stealth(page).await;

        let raw = extract::read_text(page, &source.selector, self.scraper.timeout_ms)
            .await
            .ok_or_else(|| ScrapeError::Extraction(source.url.clone()))?;

        let price = parse_price(&raw);
        if !validate_price(price) {
            return Err(ScrapeError::Parse {
                text: raw,
                source_url: source.url.clone(),
            });
        }

        Ok(SourcePrice {
            price,
            currency: source.currency.clone(),
            source_url: source.url.clone(),
        })
    }

    /// Tear down the browser session.
    pub async fn cleanup(&self) {
        self.session.lock().await.cleanup().await;
    }
}

/// Build the composite observation from per-source results (in scrape
/// order). The primary field is the first successfully scraped source in
/// configured order; an empty result set fails the batch.
fn assemble_observation(
    sources: &[SourceConfig],
    results: Vec<(String, SourcePrice)>,
    time_period: &str,
) -> Result<MultiSourceObservation, ScrapeError> {
    if results.is_empty() {
        return Err(ScrapeError::AllSourcesFailed(sources.len()));
    }

    let primary_field = results[0].0.clone();
    let prices: BTreeMap<String, SourcePrice> = results.into_iter().collect();

    Ok(MultiSourceObservation {
        captured_at: Utc::now(),
        time_period: time_period.to_string(),
        prices,
        primary_field,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(name: &str, field: &str) -> SourceConfig {
        SourceConfig {
            name: name.to_string(),
            url: format!("https://example.com/{}", field),
            selector: ".price".to_string(),
            field_name: field.to_string(),
            currency: "USD".to_string(),
        }
    }

    fn price(value: f64, field: &str) -> SourcePrice {
        SourcePrice {
            price: value,
            currency: "USD".to_string(),
            source_url: format!("https://example.com/{}", field),
        }
    }

    #[tokio::test]
    async fn empty_source_list_is_a_config_error() {
        let scraper = MultiSourceScraper::new(
            ScraperConfig::default(),
            MultiScrapeConfig::default(),
            PathBuf::from("/tmp"),
        );

        let err = scraper.scrape().await.unwrap_err();
        assert!(matches!(err, ScrapeError::Config(_)));
    }

    #[tokio::test]
    async fn invalid_source_url_fails_before_launching_a_browser() {
        let mut config = MultiScrapeConfig::default();
        let mut bad = source("New York", "ny_price");
        bad.url = "definitely not a url".to_string();
        config.sources.push(bad);

        let scraper =
            MultiSourceScraper::new(ScraperConfig::default(), config, PathBuf::from("/tmp"));

        let err = scraper.scrape().await.unwrap_err();
        assert!(matches!(err, ScrapeError::Config(_)));
    }

    #[test]
    fn partial_failure_keeps_surviving_fields() {
        // Three configured sources; the second one's selector never matched
        let sources = vec![
            source("New York", "ny_price"),
            source("London", "ldn_price"),
            source("Zurich", "zrh_price"),
        ];
        let results = vec![
            ("ny_price".to_string(), price(2050.10, "ny_price")),
            ("zrh_price".to_string(), price(2049.80, "zrh_price")),
        ];

        let observation = assemble_observation(&sources, results, "realtime").unwrap();
        assert_eq!(observation.prices.len(), 2);
        assert!(observation.prices.contains_key("ny_price"));
        assert!(observation.prices.contains_key("zrh_price"));
        assert!(!observation.prices.contains_key("ldn_price"));
        assert_eq!(observation.time_period, "realtime");
    }

    #[test]
    fn all_sources_failed_is_an_error() {
        let sources = vec![
            source("New York", "ny_price"),
            source("London", "ldn_price"),
            source("Zurich", "zrh_price"),
        ];

        let err = assemble_observation(&sources, Vec::new(), "realtime").unwrap_err();
        assert!(matches!(err, ScrapeError::AllSourcesFailed(3)));
    }

    #[test]
    fn primary_field_is_first_success_in_order() {
        // First configured source failed; the second becomes primary
        let sources = vec![
            source("New York", "ny_price"),
            source("London", "ldn_price"),
            source("Zurich", "zrh_price"),
        ];
        let results = vec![
            ("ldn_price".to_string(), price(1612.40, "ldn_price")),
            ("zrh_price".to_string(), price(2049.80, "zrh_price")),
        ];

        let observation = assemble_observation(&sources, results, "realtime").unwrap();
        assert_eq!(observation.primary_field, "ldn_price");
        assert_eq!(observation.primary_price(), 1612.40);
    }
}
