//! Scrape flows: price parsing, retry policy, and the single- and
//! multi-source pipelines.

mod error;
mod multi;
mod parse;
mod retry;
mod single;

pub use error::ScrapeError;
pub use multi::MultiSourceScraper;
pub use parse::{parse_price, validate_price};
pub use retry::with_retry;
pub use single::SingleSourceScraper;
