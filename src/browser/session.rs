//! Browser session lifecycle.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::emulation::SetTimezoneOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::blocking::install_request_blocking;
use crate::config::ScraperConfig;

/// Common Chrome executable paths to check.
const CHROME_PATHS: &[&str] = &[
    // Linux
    "/usr/bin/google-chrome",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/snap/bin/chromium",
    // macOS
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    // Common install locations
    "/opt/google/chrome/google-chrome",
];

/// One live browser process plus its browsing context.
///
/// Exclusively owned by the scraper instance that created it; a page handle
/// is owned by the single scrape operation that requested it and must be
/// closed on every exit path of that operation.
pub struct BrowserSession {
    config: ScraperConfig,
    browser: Option<Browser>,
    handler_task: Option<JoinHandle<()>>,
    /// Cleared by the handler task when the CDP connection drops.
    connected: Arc<AtomicBool>,
}

impl BrowserSession {
    /// Create a session. The browser launches lazily on first page request
    /// or explicit [`ensure_session`](Self::ensure_session).
    pub fn new(config: ScraperConfig) -> Self {
        Self {
            config,
            browser: None,
            handler_task: None,
            connected: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Whether a live, still-connected browser exists.
    pub fn is_connected(&self) -> bool {
        self.browser.is_some() && self.connected.load(Ordering::SeqCst)
    }

    /// Launch the browser if none exists or the current one has
    /// disconnected. No-op when a live session already exists.
    pub async fn ensure_session(&mut self) -> Result<()> {
        if self.browser.is_some() {
            if self.connected.load(Ordering::SeqCst) {
                return Ok(());
            }
            warn!("Browser disconnected, discarding stale session");
            self.cleanup().await;
        }

        info!("Launching browser (headless={})", self.config.headless);

        let chrome_path = match &self.config.executable_path {
            Some(path) => path.clone(),
            None => find_chrome()?,
        };

        let mut builder = BrowserConfig::builder()
            .chrome_executable(chrome_path)
            .no_sandbox()
            .window_size(self.config.viewport_width, self.config.viewport_height)
            .request_timeout(Duration::from_millis(self.config.timeout_ms));

        // with_head means NOT headless, confusingly
        if !self.config.headless {
            builder = builder.with_head();
        }

        // Chrome args for containerized and low-fingerprint execution
        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-infobars")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--disable-background-networking")
            .arg("--disable-sync")
            .arg("--disable-translate")
            .arg("--metrics-recording-only")
            .arg("--disable-gpu")
            .arg("--disable-software-rasterizer")
            .arg("--lang=en-US");

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg);
        }

        let browser_config = builder
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build browser config: {}", e))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .context("Failed to launch browser")?;

        let connected = Arc::new(AtomicBool::new(true));
        let connected_flag = connected.clone();
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
            connected_flag.store(false, Ordering::SeqCst);
            debug!("Browser handler loop ended");
        });

        self.browser = Some(browser);
        self.handler_task = Some(handler_task);
        self.connected = connected;

        Ok(())
    }

    /// Return a fresh page bound to the current session, with user agent,
    /// timezone, and resource blocking installed.
    ///
    /// On creation failure the session is rebuilt from scratch exactly once
    /// before the error propagates.
    pub async fn new_page(&mut self) -> Result<Page> {
        self.ensure_session().await?;

        match self.create_page().await {
            Ok(page) => Ok(page),
            Err(e) => {
                warn!("Page creation failed ({}), rebuilding browser session", e);
                self.cleanup().await;
                self.ensure_session().await?;
                self.create_page().await
            }
        }
    }

    async fn create_page(&self) -> Result<Page> {
        let browser = self
            .browser
            .as_ref()
            .context("browser not initialized after ensure_session")?;

        let page = browser
            .new_page("about:blank")
            .await
            .context("Failed to create new page")?;

        page.execute(SetUserAgentOverrideParams::new(
            self.config.user_agent.clone(),
        ))
        .await
        .context("Failed to set user agent")?;

        page.execute(SetTimezoneOverrideParams::new("UTC"))
            .await
            .context("Failed to set timezone override")?;

        install_request_blocking(&page)
            .await
            .context("Failed to install request blocking")?;

        Ok(page)
    }

    /// Close pages then the browser, logging individual close errors so one
    /// failure does not prevent the rest. Safe to call multiple times.
    pub async fn cleanup(&mut self) {
        let Some(mut browser) = self.browser.take() else {
            return;
        };

        if let Ok(pages) = browser.pages().await {
            for page in pages {
                if let Err(e) = page.close().await {
                    warn!("Failed to close page: {}", e);
                }
            }
        }

        if let Err(e) = browser.close().await {
            warn!("Failed to close browser cleanly: {}", e);
        }
        let _ = browser.wait().await;

        if let Some(task) = self.handler_task.take() {
            task.abort();
        }
        self.connected.store(false, Ordering::SeqCst);
        debug!("Browser session closed");
    }
}

/// Find a Chrome/Chromium executable on this machine.
fn find_chrome() -> Result<PathBuf> {
    for path in CHROME_PATHS {
        let p = std::path::Path::new(path);
        if p.exists() {
            info!("Found Chrome at: {}", path);
            return Ok(p.to_path_buf());
        }
    }

    for cmd in &[
        "google-chrome",
        "google-chrome-stable",
        "chromium",
        "chromium-browser",
    ] {
        if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
            if output.status.success() {
                let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                if !path.is_empty() {
                    info!("Found Chrome in PATH: {}", path);
                    return Ok(PathBuf::from(path));
                }
            }
        }
    }

    Err(anyhow::anyhow!(
        "Chrome/Chromium not found. Install it or set scraper.executable_path:\n\
         - Arch/Manjaro: sudo pacman -S chromium\n\
         - Ubuntu/Debian: sudo apt install chromium-browser\n\
         - Fedora: sudo dnf install chromium"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    // The `connected` flag is replaced on every launch, so pointer identity
    // tells the two cases apart without reaching into process internals.
    #[tokio::test]
    #[ignore = "requires a local Chrome/Chromium binary"]
    async fn pages_share_one_browser_until_cleanup() {
        let mut session = BrowserSession::new(ScraperConfig::default());

        let first = session.new_page().await.unwrap();
        let launch_marker = session.connected.clone();

        let second = session.new_page().await.unwrap();
        assert!(session.is_connected());
        assert!(Arc::ptr_eq(&launch_marker, &session.connected));

        let _ = first.close().await;
        let _ = second.close().await;
        session.cleanup().await;
        assert!(!session.is_connected());

        // A page request after teardown relaunches
        let third = session.new_page().await.unwrap();
        assert!(session.is_connected());
        assert!(!Arc::ptr_eq(&launch_marker, &session.connected));

        let _ = third.close().await;
        session.cleanup().await;
    }
}
