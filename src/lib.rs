//! PriceWatch - commodity price scraping and history service.
//!
//! Extracts a numeric price from JavaScript-rendered web pages with a
//! headless Chromium, persists observations to a SQLite store, and exposes
//! the history through a CLI, a small HTTP API, and a cron scheduler.

pub mod browser;
pub mod cli;
pub mod config;
pub mod extract;
pub mod models;
pub mod repository;
pub mod scheduler;
pub mod schema;
pub mod scrape;
pub mod server;
pub mod services;
