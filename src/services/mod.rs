//! Scrape-and-persist orchestration.
//!
//! [`ScrapeService`] wires the scrape flows to the repository and is the
//! single entry point used by the CLI, the scheduler, and the HTTP API.
//! Invocations are serialized so overlapping triggers (a cron tick landing
//! during a manual run) never share a browser.

use tokio::sync::Mutex;
use tracing::{debug, error, info};

use crate::config::{ScrapeMode, Settings};
use crate::models::{MultiSourceObservation, PriceObservation};
use crate::repository::PriceRepository;
use crate::scrape::{MultiSourceScraper, ScrapeError, SingleSourceScraper};

/// Result of one scrape-and-persist run.
///
/// A scrape can succeed while the save fails; `persisted` keeps the two
/// outcomes distinct so callers can report them separately.
#[derive(Debug)]
pub enum ScrapeOutcome {
    Single {
        observation: PriceObservation,
        persisted: bool,
    },
    Multi {
        observation: MultiSourceObservation,
        persisted: bool,
    },
}

impl ScrapeOutcome {
    pub fn persisted(&self) -> bool {
        match self {
            Self::Single { persisted, .. } | Self::Multi { persisted, .. } => *persisted,
        }
    }

    /// The headline price of the run.
    pub fn primary_price(&self) -> f64 {
        match self {
            Self::Single { observation, .. } => observation.price,
            Self::Multi { observation, .. } => observation.primary_price(),
        }
    }

    pub fn source_count(&self) -> usize {
        match self {
            Self::Single { .. } => 1,
            Self::Multi { observation, .. } => observation.prices.len(),
        }
    }
}

pub struct ScrapeService {
    repo: PriceRepository,
    single: SingleSourceScraper,
    multi: MultiSourceScraper,
    run_lock: Mutex<()>,
}

impl ScrapeService {
    pub fn new(settings: &Settings, repo: PriceRepository) -> Self {
        let screenshot_dir = settings.screenshot_dir.clone();
        Self {
            repo,
            single: SingleSourceScraper::new(
                settings.scraper.clone(),
                settings.source.clone(),
                screenshot_dir.clone(),
            ),
            multi: MultiSourceScraper::new(
                settings.scraper.clone(),
                settings.multi.clone(),
                screenshot_dir,
            ),
            run_lock: Mutex::new(()),
        }
    }

    pub fn repo(&self) -> &PriceRepository {
        &self.repo
    }

    /// Launch the browser for the given mode as a startup self-test, so
    /// long-running processes fail fast instead of on the first cron tick.
    pub async fn ensure_ready(&self, mode: ScrapeMode) -> Result<(), ScrapeError> {
        match mode {
            ScrapeMode::Single => self.single.ensure_ready().await,
            ScrapeMode::Multi => self.multi.ensure_ready().await,
        }
    }

    /// Run one scrape in the given mode and persist the result.
    pub async fn run_once(&self, mode: ScrapeMode) -> Result<ScrapeOutcome, ScrapeError> {
        let _guard = self.run_lock.lock().await;
        info!("Starting {} scrape run", mode);

        match mode {
            ScrapeMode::Single => {
                let observation = self.single.scrape().await?;
                let persisted = self.repo.insert(&observation).await;
                if persisted {
                    info!(
                        "Persisted price {} {} from {}",
                        observation.price, observation.currency, observation.source_url
                    );
                } else {
                    error!("Scrape succeeded but the record could not be saved");
                }
                Ok(ScrapeOutcome::Single {
                    observation,
                    persisted,
                })
            }
            ScrapeMode::Multi => {
                let observation = self.multi.scrape().await?;
                let persisted = self.repo.insert_multi(&observation).await;
                if persisted {
                    info!(
                        "Persisted {} source prices (primary: {})",
                        observation.prices.len(),
                        observation.primary_field
                    );
                } else {
                    error!("Scrape succeeded but the record could not be saved");
                }
                Ok(ScrapeOutcome::Multi {
                    observation,
                    persisted,
                })
            }
        }
    }

    /// Tear down both browser sessions. Idempotent.
    pub async fn shutdown(&self) {
        self.single.cleanup().await;
        self.multi.cleanup().await;
        debug!("Scrape service shut down");
    }
}
