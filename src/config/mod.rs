//! Configuration for PriceWatch.
//!
//! Every recognized option is an explicit, serde-defaulted field; defaults
//! are applied once at load time and the resulting [`Settings`] value is
//! immutable for the lifetime of the process.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Scrape mode: one fixed target page, or an ordered list of sources.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ScrapeMode {
    /// Single URL/selector pair producing one observation.
    #[default]
    Single,
    /// Ordered list of sources assembled into one composite observation.
    Multi,
}

impl std::fmt::Display for ScrapeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Multi => write!(f, "multi"),
        }
    }
}

/// Browser session configuration.
///
/// - `headless` - no visible window
/// - `timeout_ms` - navigation and element wait ceiling
/// - `retry_count` - retry engine budget for a whole scrape flow
/// - `executable_path` - overrides auto-detected Chrome binary location
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScraperConfig {
    /// Run the browser without a visible window (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Navigation and element wait timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum scrape attempts before giving up.
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,

    /// Base retry delay in milliseconds; actual delay is randomized in
    /// `[base, 2*base]`.
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// User agent presented to target pages.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Browser viewport width in pixels.
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    /// Browser viewport height in pixels.
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    /// Path to a specific Chrome/Chromium binary. Auto-detected when unset.
    #[serde(default)]
    pub executable_path: Option<PathBuf>,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            timeout_ms: default_timeout_ms(),
            retry_count: default_retry_count(),
            retry_delay_ms: default_retry_delay_ms(),
            user_agent: default_user_agent(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            executable_path: None,
            chrome_args: Vec::new(),
        }
    }
}

/// One configured price source: where and how to read one price.
///
/// Constructed once at scraper setup and immutable afterward.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceConfig {
    /// Human-readable label used in logs.
    pub name: String,
    /// Page to navigate to.
    pub url: String,
    /// Selector for the price-bearing element.
    pub selector: String,
    /// Unique output key for this source in the composite observation.
    pub field_name: String,
    /// Currency code for the extracted value.
    #[serde(default = "default_currency")]
    pub currency: String,
}

/// Single-source scrape target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SingleScrapeConfig {
    /// Page to navigate to.
    #[serde(default = "default_source_url")]
    pub url: String,
    /// Ordered candidate selectors; the first non-empty match wins.
    /// Target pages vary markup between price-rising and price-falling
    /// states, so alternates are required.
    #[serde(default = "default_selectors")]
    pub selectors: Vec<String>,
    /// Currency code stamped onto observations.
    #[serde(default = "default_currency")]
    pub currency: String,
    /// Time period label stamped onto observations.
    #[serde(default = "default_time_period")]
    pub time_period: String,
}

impl Default for SingleScrapeConfig {
    fn default() -> Self {
        Self {
            url: default_source_url(),
            selectors: default_selectors(),
            currency: default_currency(),
            time_period: default_time_period(),
        }
    }
}

/// Multi-source scrape configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MultiScrapeConfig {
    /// Ordered source list; processed strictly in this order.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// Delay between sources in milliseconds (not applied after the last).
    #[serde(default = "default_inter_source_delay_ms")]
    pub inter_source_delay_ms: u64,

    /// Parallel scraping is unsupported; setting this logs a warning and
    /// falls back to sequential.
    #[serde(default)]
    pub parallel: bool,

    /// Time period label stamped onto composite observations.
    #[serde(default = "default_multi_time_period")]
    pub time_period: String,
}

impl Default for MultiScrapeConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            inter_source_delay_ms: default_inter_source_delay_ms(),
            parallel: false,
            time_period: default_multi_time_period(),
        }
    }
}

/// Cron scheduling configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleConfig {
    /// Whether the scheduler runs at all under `serve`.
    #[serde(default = "default_schedule_enabled")]
    pub enabled: bool,

    /// Cron expression (seconds-resolution, e.g. "0 0 * * * *").
    #[serde(default = "default_cron")]
    pub cron: String,

    /// Named timezone the cron expression is evaluated in.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// Run one scrape immediately at startup in addition to the schedule.
    #[serde(default = "default_run_on_start")]
    pub run_on_start: bool,

    /// Which scrape flow scheduled runs use.
    #[serde(default)]
    pub mode: ScrapeMode,

    /// Interval for the periodic status log line, in seconds.
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            enabled: default_schedule_enabled(),
            cron: default_cron(),
            timezone: default_timezone(),
            run_on_start: default_run_on_start(),
            mode: ScrapeMode::default(),
            status_interval_secs: default_status_interval_secs(),
        }
    }
}

/// HTTP API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Top-level application settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// SQLite database file path.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Directory diagnostic screenshots are written to.
    #[serde(default = "default_screenshot_dir")]
    pub screenshot_dir: PathBuf,

    #[serde(default)]
    pub scraper: ScraperConfig,

    #[serde(default)]
    pub source: SingleScrapeConfig,

    #[serde(default)]
    pub multi: MultiScrapeConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            screenshot_dir: default_screenshot_dir(),
            scraper: ScraperConfig::default(),
            source: SingleScrapeConfig::default(),
            multi: MultiScrapeConfig::default(),
            schedule: ScheduleConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Settings {
    /// Load settings from an explicit path, `pricewatch.toml` in the working
    /// directory, or defaults when no file exists. Environment overrides
    /// (`PRICEWATCH_DB`, `PRICEWATCH_SCREENSHOT_DIR`) are applied last.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let candidate = path
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("pricewatch.toml"));

        let mut settings = if candidate.exists() {
            let text = std::fs::read_to_string(&candidate)?;
            toml::from_str(&text)
                .map_err(|e| anyhow::anyhow!("Invalid config {}: {}", candidate.display(), e))?
        } else if path.is_some() {
            anyhow::bail!("Config file not found: {}", candidate.display());
        } else {
            Settings::default()
        };

        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PRICEWATCH_DB") {
            if !val.is_empty() {
                self.database_path = PathBuf::from(val);
            }
        }
        if let Ok(val) = std::env::var("PRICEWATCH_SCREENSHOT_DIR") {
            if !val.is_empty() {
                self.screenshot_dir = PathBuf::from(val);
            }
        }
    }

    /// Database URL for the diesel connection layer.
    pub fn database_url(&self) -> String {
        self.database_path.display().to_string()
    }
}

fn default_headless() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    2_000
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/120.0.0.0 Safari/537.36"
        .to_string()
}

fn default_viewport_width() -> u32 {
    1920
}

fn default_viewport_height() -> u32 {
    1080
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_time_period() -> String {
    "1d".to_string()
}

fn default_multi_time_period() -> String {
    "realtime".to_string()
}

fn default_source_url() -> String {
    "https://goldprice.org/".to_string()
}

fn default_selectors() -> Vec<String> {
    vec![
        ".gpo-price-value".to_string(),
        ".gpo-price".to_string(),
        "#gold-price".to_string(),
    ]
}

fn default_inter_source_delay_ms() -> u64 {
    3_000
}

fn default_schedule_enabled() -> bool {
    true
}

fn default_cron() -> String {
    // Top of every hour
    "0 0 * * * *".to_string()
}

fn default_timezone() -> String {
    "UTC".to_string()
}

fn default_run_on_start() -> bool {
    true
}

fn default_status_interval_secs() -> u64 {
    300
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8732
}

fn default_database_path() -> PathBuf {
    PathBuf::from("pricewatch.db")
}

fn default_screenshot_dir() -> PathBuf {
    PathBuf::from("screenshots")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scraper_config_defaults() {
        let config = ScraperConfig::default();
        assert!(config.headless);
        assert_eq!(config.timeout_ms, 30_000);
        assert_eq!(config.retry_count, 3);
        assert_eq!(config.retry_delay_ms, 2_000);
        assert_eq!(config.viewport_width, 1920);
        assert_eq!(config.viewport_height, 1080);
        assert!(config.executable_path.is_none());
        assert!(config.chrome_args.is_empty());
    }

    #[test]
    fn settings_defaults_match_serde_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.database_path, PathBuf::from("pricewatch.db"));
        assert_eq!(settings.screenshot_dir, PathBuf::from("screenshots"));
        assert_eq!(settings.multi.inter_source_delay_ms, 3_000);
        assert_eq!(settings.multi.time_period, "realtime");
        assert_eq!(settings, toml::from_str("").unwrap());
    }

    #[test]
    fn scraper_config_serde_defaults() {
        let config: ScraperConfig = toml::from_str("").unwrap();
        assert_eq!(config, ScraperConfig::default());
    }

    #[test]
    fn settings_from_toml() {
        let text = r#"
            database_path = "/tmp/prices.db"

            [scraper]
            headless = false
            timeout_ms = 10000
            executable_path = "/usr/bin/chromium"

            [[multi.sources]]
            name = "New York"
            url = "https://example.com/ny"
            selector = ".price"
            field_name = "ny_price"

            [[multi.sources]]
            name = "London"
            url = "https://example.com/ldn"
            selector = ".price"
            field_name = "ldn_price"
            currency = "GBP"

            [schedule]
            cron = "0 */5 * * * *"
            timezone = "America/New_York"
            run_on_start = false
            mode = "multi"
        "#;

        let settings: Settings = toml::from_str(text).unwrap();
        assert_eq!(settings.database_path, PathBuf::from("/tmp/prices.db"));
        assert!(!settings.scraper.headless);
        assert_eq!(settings.scraper.timeout_ms, 10_000);
        assert_eq!(
            settings.scraper.executable_path,
            Some(PathBuf::from("/usr/bin/chromium"))
        );
        // Unset fields fall back to defaults
        assert_eq!(settings.scraper.retry_count, 3);

        assert_eq!(settings.multi.sources.len(), 2);
        assert_eq!(settings.multi.sources[0].field_name, "ny_price");
        assert_eq!(settings.multi.sources[0].currency, "USD");
        assert_eq!(settings.multi.sources[1].currency, "GBP");
        assert_eq!(settings.multi.inter_source_delay_ms, 3_000);
        assert!(!settings.multi.parallel);

        assert_eq!(settings.schedule.mode, ScrapeMode::Multi);
        assert_eq!(settings.schedule.timezone, "America/New_York");
        assert!(!settings.schedule.run_on_start);
    }

    #[test]
    fn schedule_defaults() {
        let schedule = ScheduleConfig::default();
        assert!(schedule.enabled);
        assert_eq!(schedule.cron, "0 0 * * * *");
        assert_eq!(schedule.timezone, "UTC");
        assert!(schedule.run_on_start);
        assert_eq!(schedule.mode, ScrapeMode::Single);
    }

    #[test]
    fn scrape_mode_serde() {
        let single: ScrapeMode = serde_json::from_str("\"single\"").unwrap();
        assert_eq!(single, ScrapeMode::Single);
        let multi: ScrapeMode = serde_json::from_str("\"multi\"").unwrap();
        assert_eq!(multi, ScrapeMode::Multi);
    }
}
