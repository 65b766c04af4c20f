//! Headless browser session management.
//!
//! Uses chromiumoxide (CDP) to own one Chromium process per scraper
//! instance, with stealth evasion and resource-type request blocking.

mod blocking;
mod session;
mod stealth;

pub use blocking::is_blocked_resource;
pub use session::BrowserSession;
pub use stealth::apply_stealth;
