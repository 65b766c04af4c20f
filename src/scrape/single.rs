//! Single-source scrape flow.

use std::path::PathBuf;
use std::time::Duration;

use chromiumoxide::Page;
use tokio::sync::Mutex;
use tracing::{info, warn};

use super::{parse_price, validate_price, with_retry, ScrapeError};
use crate::browser::BrowserSession;
use crate::config::{ScraperConfig, SingleScrapeConfig};
use crate::extract;
use crate::models::PriceObservation;

/// Scrapes one fixed URL/selector-list pair into a [`PriceObservation`].
///
/// Owns the browser session exclusively; the session stays live across
/// retry attempts and is torn down once via [`cleanup`](Self::cleanup).
pub struct SingleSourceScraper {
    session: Mutex<BrowserSession>,
    scraper: ScraperConfig,
    target: SingleScrapeConfig,
    screenshot_dir: PathBuf,
}

impl SingleSourceScraper {
    pub fn new(
        scraper: ScraperConfig,
        target: SingleScrapeConfig,
        screenshot_dir: PathBuf,
    ) -> Self {
        Self {
            session: Mutex::new(BrowserSession::new(scraper.clone())),
            scraper,
            target,
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

    /// Run the flow through the retry engine.
    pub async fn scrape(&self) -> Result<PriceObservation, ScrapeError> {
        url::Url::parse(&self.target.url)
            .map_err(|e| ScrapeError::Config(format!("source.url {:?}: {}", self.target.url, e)))?;
        if self.target.selectors.is_empty() {
            return Err(ScrapeError::Config(
                "source.selectors must list at least one selector".into(),
            ));
        }

        with_retry(
            || self.scrape_attempt(),
            self.scraper.retry_count,
            Duration::from_millis(self.scraper.retry_delay_ms),
        )
        .await
    }

    /// One attempt: open a page, extract, parse, and close the page on
    /// every exit path.
    async fn scrape_attempt(&self) -> Result<PriceObservation, ScrapeError> {
        let page = {
            let mut session = self.session.lock().await;
            session
                .new_page()
                .await
                .map_err(|e| ScrapeError::Session(e.to_string()))?
        };

        let result = self.extract_on_page(&page).await;

        // Hard extraction and parse failures leave a diagnostic screenshot
        if matches!(
            result,
            Err(ScrapeError::Extraction(_)) | Err(ScrapeError::Parse { .. })
        ) {
            if let Err(e) =
                extract::capture_screenshot(&page, &self.screenshot_dir, "scrape_failure").await
            {
                warn!("Screenshot capture failed: {}", e);
            }
        }

        if let Err(e) = page.close().await {
            warn!("Failed to close page: {}", e);
        }

        result
    }

    async fn extract_on_page(&self, page: &Page) -> Result<PriceObservation, ScrapeError> {
        extract::navigate(page, &self.target.url, self.scraper.timeout_ms).await?;
        crate::browser::apply_stealth(page).await;

        // Diagnostic only: log blocking markers without aborting
        if let Some(text) = extract::page_text(page).await {
            if let Some(marker) = extract::find_block_marker(&text) {
                warn!(
                    "Page {} may be blocking us (contains {:?})",
                    self.target.url, marker
                );
            }
        }

        let raw = extract::read_text_any(page, &self.target.selectors, self.scraper.timeout_ms)
            .await
            .ok_or_else(|| ScrapeError::Extraction(self.target.url.clone()))?;

        let price = parse_price(&raw);
        if !validate_price(price) {
            return Err(ScrapeError::Parse {
                text: raw,
                source_url: self.target.url.clone(),
            });
        }

        info!(
            "Scraped price {} {} from {}",
            price, self.target.currency, self.target.url
        );

        Ok(PriceObservation::new(
            price,
            self.target.currency.clone(),
            self.target.url.clone(),
            self.target.time_period.clone(),
        ))
    }

    /// Tear down the browser session.
    pub async fn cleanup(&self) {
        self.session.lock().await.cleanup().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scraper_with(target: SingleScrapeConfig) -> SingleSourceScraper {
        SingleSourceScraper::new(ScraperConfig::default(), target, PathBuf::from("/tmp"))
    }

    #[tokio::test]
    async fn invalid_url_fails_before_launching_a_browser() {
        let scraper = scraper_with(SingleScrapeConfig {
            url: "not a url".to_string(),
            ..SingleScrapeConfig::default()
        });

        let err = scraper.scrape().await.unwrap_err();
        assert!(matches!(err, ScrapeError::Config(_)));
    }

    #[tokio::test]
    async fn empty_selector_list_is_a_config_error() {
        let scraper = scraper_with(SingleScrapeConfig {
            selectors: Vec::new(),
            ..SingleScrapeConfig::default()
        });

        let err = scraper.scrape().await.unwrap_err();
        assert!(matches!(err, ScrapeError::Config(_)));
    }
}
