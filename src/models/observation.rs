//! Price observations produced by scrape flows.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped price reading from a single scrape attempt.
///
/// Invariant: `price` is finite and greater than zero; a non-positive value
/// is an extraction failure and is never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceObservation {
    pub price: f64,
    pub currency: String,
    pub captured_at: DateTime<Utc>,
    pub source_url: String,
    pub time_period: String,
}

impl PriceObservation {
    pub fn new(price: f64, currency: String, source_url: String, time_period: String) -> Self {
        Self {
            price,
            currency,
            captured_at: Utc::now(),
            source_url,
            time_period,
        }
    }
}

/// One price from one source within a composite observation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourcePrice {
    pub price: f64,
    pub currency: String,
    pub source_url: String,
}

/// A composite observation assembled from several configured sources.
///
/// Invariant: `prices` is non-empty; a batch where every source failed is
/// discarded rather than persisted with zeros. `primary_field` names the
/// first source (in configured order) that scraped successfully; its price
/// populates the compatibility `price` value of the stored row. Which field
/// that is should not be relied upon beyond that rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiSourceObservation {
    pub captured_at: DateTime<Utc>,
    pub time_period: String,
    pub prices: BTreeMap<String, SourcePrice>,
    pub primary_field: String,
}

impl MultiSourceObservation {
    /// The compatibility price: the primary field's value.
    pub fn primary_price(&self) -> f64 {
        self.prices
            .get(&self.primary_field)
            .map(|p| p.price)
            .unwrap_or(0.0)
    }
}
