//! Persisted row shapes read back from the store.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::SourcePrice;

/// A persisted single-source price row.
///
/// `id` and `created_at` are assigned by the store at insert time, never
/// supplied by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    pub id: i32,
    pub price: f64,
    pub created_at: DateTime<Utc>,
    pub source: String,
    pub currency: String,
    pub time_period: String,
}

/// A persisted multi-source row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiStoredRecord {
    pub id: i32,
    /// Compatibility price: the primary field's value at capture time.
    pub price: f64,
    pub created_at: DateTime<Utc>,
    pub time_period: String,
    pub prices: BTreeMap<String, SourcePrice>,
}
