//! Scrape error taxonomy.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Invalid or missing configuration. Fatal to the invocation; the flows
    /// check configuration before entering the retry engine, so this never
    /// consumes retry budget.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Browser or page lifecycle failure, after the session manager's one
    /// internal rebuild attempt. Retryable.
    #[error("Browser session error: {0}")]
    Session(String),

    /// Navigation failed or timed out.
    #[error("Navigation failed for {url}: {reason}")]
    Navigation { url: String, reason: String },

    /// No candidate selector yielded text.
    #[error("No selector matched any element on {0}")]
    Extraction(String),

    /// Recovered text did not yield a positive finite number.
    #[error("Could not parse price from {text:?} ({source_url})")]
    Parse { text: String, source_url: String },

    /// Every configured source in a multi-source batch failed.
    #[error("All {0} configured sources failed")]
    AllSourcesFailed(usize),
}
