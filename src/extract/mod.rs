//! Page navigation and element-text extraction.
//!
//! Extraction never throws for a missing element; it returns `None` so the
//! caller can try alternate selectors. Hard failures are decided by the
//! scrape flows, which also own diagnostic screenshot capture.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::page::NavigateParams;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use chrono::Utc;
use rand::Rng;
use tracing::{debug, warn};

use crate::scrape::ScrapeError;

/// Interval between element lookups while waiting for a selector.
const SELECTOR_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// JavaScript to wait for page ready state. Resolves on DOM content loaded
/// rather than network idle, to tolerate pages with long-polling or
/// streaming connections that never go idle.
const WAIT_FOR_READY_SCRIPT: &str = r#"
    new Promise((resolve) => {
        if (document.readyState === 'complete' || document.readyState === 'interactive') {
            resolve(document.readyState);
        } else {
            document.addEventListener('DOMContentLoaded', () => resolve(document.readyState));
            setTimeout(() => resolve('timeout'), 10000);
        }
    })
"#;

/// Markers that indicate the page blocked us rather than rendering a price.
const BLOCK_MARKERS: &[&str] = &[
    "access denied",
    "blocked",
    "captcha",
    "rate limit",
    "zugriff verweigert",
    "acceso denegado",
];

/// Navigate to `url`, wait for DOM content loaded, then pause for a
/// randomized human-like delay before any extraction.
pub async fn navigate(page: &Page, url: &str, timeout_ms: u64) -> Result<(), ScrapeError> {
    debug!("Navigating to {}", url);
    let params = NavigateParams::builder()
        .url(url)
        .build()
        .map_err(|e| ScrapeError::Navigation {
            url: url.to_string(),
            reason: format!("invalid URL: {}", e),
        })?;

    let nav_timeout = Duration::from_millis(timeout_ms);
    tokio::time::timeout(nav_timeout, page.execute(params))
        .await
        .map_err(|_| ScrapeError::Navigation {
            url: url.to_string(),
            reason: format!("timed out after {}ms", timeout_ms),
        })?
        .map_err(|e| ScrapeError::Navigation {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    wait_for_dom_ready(page, timeout_ms).await;
    human_delay().await;

    Ok(())
}

/// Wait for the page to reach a ready state.
async fn wait_for_dom_ready(page: &Page, timeout_ms: u64) {
    let ready_timeout = Duration::from_millis(timeout_ms);
    match tokio::time::timeout(
        ready_timeout,
        page.evaluate(WAIT_FOR_READY_SCRIPT.to_string()),
    )
    .await
    {
        Ok(Ok(result)) => {
            let state: String = result
                .into_value()
                .unwrap_or_else(|_| "unknown".to_string());
            debug!("Page ready state: {}", state);
        }
        Ok(Err(e)) => {
            debug!("Could not check ready state: {}", e);
        }
        Err(_) => {
            warn!("Timeout waiting for page ready state");
        }
    }
}

/// Uniformly distributed 1000-3000 ms pause to reduce automation
/// fingerprinting.
async fn human_delay() {
    let delay = Duration::from_millis(rand::rng().random_range(1000..=3000));
    tokio::time::sleep(delay).await;
}

/// Wait up to `timeout_ms` for an element matching `selector` and return
/// its trimmed text. Returns `None` on timeout or absent element instead of
/// erroring, so callers can try alternate selectors.
pub async fn read_text(page: &Page, selector: &str, timeout_ms: u64) -> Option<String> {
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);

    loop {
        if let Ok(element) = page.find_element(selector).await {
            if let Ok(Some(text)) = element.inner_text().await {
                if let Some(text) = usable_text(&text) {
                    return Some(text);
                }
            }
        }

        if Instant::now() >= deadline {
            debug!("Selector {:?} not found within {}ms", selector, timeout_ms);
            return None;
        }
        tokio::time::sleep(SELECTOR_POLL_INTERVAL).await;
    }
}

/// Element text is usable once trimmed of surrounding whitespace and still
/// non-empty. Anything else keeps the selector wait polling.
fn usable_text(raw: &str) -> Option<String> {
    let text = raw.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// Try each candidate selector in order and accept the first usable
/// result. Target pages vary markup between price-rising and price-falling
/// states, and layout migrations move selector paths over time.
pub async fn read_text_any(page: &Page, selectors: &[String], timeout_ms: u64) -> Option<String> {
    for selector in selectors {
        if let Some(text) = read_text(page, selector, timeout_ms).await {
            debug!("Selector {:?} matched: {:?}", selector, text);
            return Some(text);
        }
    }
    None
}

/// Full visible page text, for diagnostics.
pub async fn page_text(page: &Page) -> Option<String> {
    page.evaluate("document.body ? document.body.innerText : ''")
        .await
        .ok()
        .and_then(|result| result.into_value::<String>().ok())
}

/// Check page text for known blocking markers. Diagnostic only; the scrape
/// continues regardless.
pub fn find_block_marker(text: &str) -> Option<&'static str> {
    let lowered = text.to_lowercase();
    BLOCK_MARKERS
        .iter()
        .find(|marker| lowered.contains(*marker))
        .copied()
}

/// Write a full-page screenshot to `dir` with a timestamp-derived name.
pub async fn capture_screenshot(page: &Page, dir: &Path, label: &str) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create screenshot dir {}", dir.display()))?;

    let filename = format!("{}_{}.png", label, Utc::now().format("%Y%m%d_%H%M%S%.3f"));
    let path = dir.join(filename);

    let bytes = page
        .screenshot(ScreenshotParams::builder().full_page(true).build())
        .await
        .context("Failed to capture screenshot")?;

    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("Failed to write screenshot {}", path.display()))?;

    warn!("Saved diagnostic screenshot to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::BrowserSession;
    use crate::config::ScraperConfig;
    use crate::scrape::parse_price;

    #[test]
    fn usable_text_trims_and_rejects_blank_results() {
        assert_eq!(usable_text("  2,050.10\n"), Some("2,050.10".to_string()));
        assert_eq!(usable_text("2050.10"), Some("2050.10".to_string()));
        assert_eq!(usable_text(""), None);
        assert_eq!(usable_text("   \n\t  "), None);
    }

    #[tokio::test]
    #[ignore = "requires a local Chrome/Chromium binary"]
    async fn fallback_selector_supplies_the_price_text() {
        let mut session = BrowserSession::new(ScraperConfig::default());
        let page = session.new_page().await.unwrap();

        // The primary selector is absent; the alternate one carries the value
        navigate(
            &page,
            "data:text/html,<span class=\"price-alt\">2,050.10</span>",
            10_000,
        )
        .await
        .unwrap();

        let selectors = vec![".price-main".to_string(), ".price-alt".to_string()];
        let text = read_text_any(&page, &selectors, 1_000).await.unwrap();
        assert_eq!(parse_price(&text), 2050.10);

        let _ = page.close().await;
        session.cleanup().await;
    }

    #[test]
    fn block_markers_are_case_insensitive() {
        assert_eq!(
            find_block_marker("Error: Access Denied by upstream"),
            Some("access denied")
        );
        assert_eq!(
            find_block_marker("Your request was BLOCKED"),
            Some("blocked")
        );
        assert_eq!(find_block_marker("Gold: $2,048.75 per ounce"), None);
    }

    #[test]
    fn block_markers_cover_localized_variants() {
        assert_eq!(
            find_block_marker("Zugriff verweigert"),
            Some("zugriff verweigert")
        );
    }
}
