//! Repository layer for database persistence.
//!
//! All database access uses Diesel ORM with compile-time query checking
//! over diesel-async's SyncConnectionWrapper for SQLite.

mod diesel_models;
mod pool;
mod prices;

pub use pool::{AsyncSqlitePool, DieselError};
pub use prices::PriceRepository;

use chrono::{DateTime, Utc};

/// Parse a datetime string from the database, defaulting to Unix epoch on error.
pub(crate) fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or(DateTime::UNIX_EPOCH)
}

/// Format a timestamp the way the store's column default does, so that text
/// comparisons against store-assigned values stay consistent.
pub(crate) fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn datetime_round_trip() {
        let dt = Utc.with_ymd_and_hms(2026, 3, 14, 9, 26, 53).unwrap();
        let text = format_datetime(&dt);
        assert_eq!(text, "2026-03-14T09:26:53.000Z");
        assert_eq!(parse_datetime(&text), dt);
    }

    #[test]
    fn invalid_datetime_falls_back_to_epoch() {
        assert_eq!(parse_datetime("not a date"), DateTime::UNIX_EPOCH);
    }
}
