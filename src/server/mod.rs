//! HTTP API for reading stored prices and triggering scrapes.

mod handlers;
mod routes;

pub use routes::create_router;

use std::sync::Arc;

use crate::config::ScrapeMode;
use crate::repository::PriceRepository;
use crate::services::ScrapeService;

/// Shared state for the API server.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ScrapeService>,
    pub repo: PriceRepository,
    /// Flow the POST /api/scrape endpoint and mode-aware reads use.
    pub mode: ScrapeMode,
}

impl AppState {
    pub fn new(service: Arc<ScrapeService>, mode: ScrapeMode) -> Self {
        let repo = service.repo().clone();
        Self {
            service,
            repo,
            mode,
        }
    }
}
