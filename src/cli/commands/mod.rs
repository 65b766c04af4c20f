pub mod history;
pub mod prune;
pub mod scrape;
pub mod serve;
pub mod status;
