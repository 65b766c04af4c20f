//! Persistence gateway for price observations.
//!
//! Write operations follow a never-throw contract: store-level errors are
//! caught, logged with the attempted record, and converted to `false`, so a
//! successful scrape with a failed save is reported distinctly from a
//! failed scrape. Read operations surface errors to the caller.

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel_async::{RunQueryDsl, SimpleAsyncConnection};
use tracing::{debug, error, warn};

use super::diesel_models::{
    MultiPriceRecord, NewMultiPriceRecord, NewPriceRecord, PriceRecord,
};
use super::pool::{AsyncSqlitePool, DieselError};
use super::{format_datetime, parse_datetime};
use crate::models::{MultiSourceObservation, MultiStoredRecord, PriceObservation, StoredRecord};
use crate::schema::{multi_price_records, price_records};

/// `created_at` is store-assigned; clients never supply it in normal flow.
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS price_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    price DOUBLE NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    source TEXT NOT NULL,
    currency TEXT NOT NULL DEFAULT 'USD',
    time_period TEXT NOT NULL DEFAULT '1d'
);
CREATE INDEX IF NOT EXISTS idx_price_records_created_at
    ON price_records(created_at);
CREATE TABLE IF NOT EXISTS multi_price_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    price DOUBLE NOT NULL,
    created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
    time_period TEXT NOT NULL DEFAULT 'realtime',
    prices TEXT NOT NULL DEFAULT '{}'
);
CREATE INDEX IF NOT EXISTS idx_multi_price_records_created_at
    ON multi_price_records(created_at);
"#;

/// Re-coerce a price to a valid numeric before insertion, even though the
/// upstream parser already produced a number. Guards against a non-finite
/// or non-positive value reaching a column that downstream aggregation sums.
fn coerce_price(price: f64) -> Option<f64> {
    if price.is_finite() && price > 0.0 {
        Some(price)
    } else {
        None
    }
}

impl From<PriceRecord> for StoredRecord {
    fn from(record: PriceRecord) -> Self {
        StoredRecord {
            id: record.id,
            price: record.price,
            created_at: parse_datetime(&record.created_at),
            source: record.source,
            currency: record.currency,
            time_period: record.time_period,
        }
    }
}

impl From<MultiPriceRecord> for MultiStoredRecord {
    fn from(record: MultiPriceRecord) -> Self {
        MultiStoredRecord {
            id: record.id,
            price: record.price,
            created_at: parse_datetime(&record.created_at),
            time_period: record.time_period,
            prices: serde_json::from_str(&record.prices).unwrap_or_default(),
        }
    }
}

/// Diesel-backed price repository.
#[derive(Clone)]
pub struct PriceRepository {
    pool: AsyncSqlitePool,
}

impl PriceRepository {
    /// Create a new price repository with an existing pool.
    pub fn new(pool: AsyncSqlitePool) -> Self {
        Self { pool }
    }

    /// Create the tables if they do not exist yet. Idempotent.
    pub async fn ensure_schema(&self) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        conn.batch_execute(SCHEMA_SQL).await
    }

    /// Insert one observation. Returns `false` on any store error.
    pub async fn insert(&self, observation: &PriceObservation) -> bool {
        let Some(price) = coerce_price(observation.price) else {
            warn!(
                "Refusing to insert non-positive price {} from {}",
                observation.price, observation.source_url
            );
            return false;
        };

        let record = NewPriceRecord {
            price,
            source: &observation.source_url,
            currency: &observation.currency,
            time_period: &observation.time_period,
        };

        match self.insert_record(&record).await {
            Ok(()) => true,
            Err(e) => {
                error!("Failed to insert price record {:?}: {}", record, e);
                false
            }
        }
    }

    /// Insert many observations in one call. Used by restore/backfill paths,
    /// not the live scrape flow. An empty batch is a no-op success; `false`
    /// means rows were dropped as invalid or the store rejected the write.
    pub async fn insert_batch(&self, observations: &[PriceObservation]) -> bool {
        if observations.is_empty() {
            return true;
        }

        let rows: Vec<NewPriceRecord<'_>> = observations
            .iter()
            .filter_map(|obs| {
                let price = coerce_price(obs.price)?;
                Some(NewPriceRecord {
                    price,
                    source: &obs.source_url,
                    currency: &obs.currency,
                    time_period: &obs.time_period,
                })
            })
            .collect();

        if rows.is_empty() {
            return false;
        }

        // diesel-async's SyncConnectionWrapper cannot drive diesel's
        // SQLite-only batch insert specialization, so execute rows one at
        // a time (see REVIEW_FINDINGS.md F6).
        let result: Result<usize, DieselError> = async {
            let mut conn = self.pool.get().await?;
            let mut count = 0;
            for row in &rows {
                count += diesel::insert_into(price_records::table)
                    .values(row)
                    .execute(&mut conn)
                    .await?;
            }
            Ok(count)
        }
        .await;

        match result {
            Ok(count) => {
                debug!("Inserted {} price records", count);
                true
            }
            Err(e) => {
                error!("Failed to insert batch of {} records: {}", rows.len(), e);
                false
            }
        }
    }

    /// Insert one composite observation. Returns `false` on any store error
    /// or when the observation violates the non-empty-prices invariant.
    pub async fn insert_multi(&self, observation: &MultiSourceObservation) -> bool {
        if observation.prices.is_empty() {
            warn!("Refusing to insert multi-source observation with no prices");
            return false;
        }
        let Some(price) = coerce_price(observation.primary_price()) else {
            warn!(
                "Refusing to insert multi-source observation with invalid primary price {}",
                observation.primary_price()
            );
            return false;
        };

        let prices_json = match serde_json::to_string(&observation.prices) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize multi-source prices: {}", e);
                return false;
            }
        };

        let record = NewMultiPriceRecord {
            price,
            time_period: &observation.time_period,
            prices: &prices_json,
        };

        let result: Result<usize, DieselError> = async {
            let mut conn = self.pool.get().await?;
            diesel::insert_into(multi_price_records::table)
                .values(&record)
                .execute(&mut conn)
                .await
        }
        .await;

        match result {
            Ok(_) => true,
            Err(e) => {
                error!("Failed to insert multi-source record {:?}: {}", record, e);
                false
            }
        }
    }

    /// Up to `limit` rows, newest first.
    pub async fn latest(&self, limit: i64) -> Result<Vec<StoredRecord>, DieselError> {
        let mut conn = self.pool.get().await?;

        price_records::table
            .order((
                price_records::created_at.desc(),
                price_records::id.desc(),
            ))
            .limit(limit)
            .load::<PriceRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(StoredRecord::from).collect())
    }

    /// Up to `limit` multi-source rows, newest first.
    pub async fn latest_multi(&self, limit: i64) -> Result<Vec<MultiStoredRecord>, DieselError> {
        let mut conn = self.pool.get().await?;

        multi_price_records::table
            .order((
                multi_price_records::created_at.desc(),
                multi_price_records::id.desc(),
            ))
            .limit(limit)
            .load::<MultiPriceRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(MultiStoredRecord::from).collect())
    }

    /// Rows created within `[start, end]`, oldest first, capped at `limit`.
    pub async fn range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<StoredRecord>, DieselError> {
        let mut conn = self.pool.get().await?;
        let start_text = format_datetime(&start);
        let end_text = format_datetime(&end);

        price_records::table
            .filter(price_records::created_at.ge(start_text))
            .filter(price_records::created_at.le(end_text))
            .order((price_records::created_at.asc(), price_records::id.asc()))
            .limit(limit)
            .load::<PriceRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(StoredRecord::from).collect())
    }

    /// Multi-source rows created within `[start, end]`, oldest first, capped
    /// at `limit`.
    pub async fn range_multi(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<MultiStoredRecord>, DieselError> {
        let mut conn = self.pool.get().await?;
        let start_text = format_datetime(&start);
        let end_text = format_datetime(&end);

        multi_price_records::table
            .filter(multi_price_records::created_at.ge(start_text))
            .filter(multi_price_records::created_at.le(end_text))
            .order((
                multi_price_records::created_at.asc(),
                multi_price_records::id.asc(),
            ))
            .limit(limit)
            .load::<MultiPriceRecord>(&mut conn)
            .await
            .map(|records| records.into_iter().map(MultiStoredRecord::from).collect())
    }

    /// Total single-source row count.
    pub async fn count(&self) -> Result<i64, DieselError> {
        let mut conn = self.pool.get().await?;

        use diesel::dsl::count_star;
        price_records::table
            .select(count_star())
            .first(&mut conn)
            .await
    }

    /// Remove rows older than `days` days. Returns `false` on store error.
    pub async fn delete_older_than(&self, days: i64) -> bool {
        let cutoff = format_datetime(&(Utc::now() - Duration::days(days)));

        let result: Result<usize, DieselError> = async {
            let mut conn = self.pool.get().await?;
            let singles = diesel::delete(
                price_records::table.filter(price_records::created_at.lt(&cutoff)),
            )
            .execute(&mut conn)
            .await?;
            let multis = diesel::delete(
                multi_price_records::table.filter(multi_price_records::created_at.lt(&cutoff)),
            )
            .execute(&mut conn)
            .await?;
            Ok(singles + multis)
        }
        .await;

        match result {
            Ok(count) => {
                debug!("Deleted {} records older than {} days", count, days);
                true
            }
            Err(e) => {
                error!("Failed to delete records older than {} days: {}", days, e);
                false
            }
        }
    }

    /// Minimal read to verify reachability. Used as a startup gate before
    /// scheduling any scrape.
    pub async fn test_connection(&self) -> bool {
        match self.count().await {
            Ok(_) => true,
            Err(e) => {
                error!("Database connection test failed: {}", e);
                false
            }
        }
    }

    async fn insert_record(&self, record: &NewPriceRecord<'_>) -> Result<(), DieselError> {
        let mut conn = self.pool.get().await?;
        diesel::insert_into(price_records::table)
            .values(record)
            .execute(&mut conn)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SourcePrice;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    async fn setup_test_repo() -> (PriceRepository, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let pool = AsyncSqlitePool::from_path(&db_path);
        let repo = PriceRepository::new(pool);
        repo.ensure_schema().await.unwrap();
        (repo, dir)
    }

    fn observation(price: f64) -> PriceObservation {
        PriceObservation::new(
            price,
            "USD".to_string(),
            "https://example.com/gold".to_string(),
            "1d".to_string(),
        )
    }

    #[tokio::test]
    async fn insert_and_read_back() {
        let (repo, _dir) = setup_test_repo().await;

        assert!(repo.insert(&observation(2048.75)).await);

        let rows = repo.latest(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].price, 2048.75);
        assert_eq!(rows[0].currency, "USD");
        assert_eq!(rows[0].source, "https://example.com/gold");
        // created_at came from the store, not the observation
        assert!(rows[0].created_at.timestamp() > 0);
    }

    #[tokio::test]
    async fn duplicate_inserts_produce_distinct_rows() {
        let (repo, _dir) = setup_test_repo().await;

        // The store does not dedupe; each insert succeeds independently.
        assert!(repo.insert(&observation(1999.10)).await);
        assert!(repo.insert(&observation(1999.10)).await);

        assert_eq!(repo.count().await.unwrap(), 2);
        let rows = repo.latest(10).await.unwrap();
        assert_ne!(rows[0].id, rows[1].id);
    }

    #[tokio::test]
    async fn non_positive_price_is_rejected() {
        let (repo, _dir) = setup_test_repo().await;

        assert!(!repo.insert(&observation(0.0)).await);
        assert!(!repo.insert(&observation(-12.5)).await);
        assert!(!repo.insert(&observation(f64::NAN)).await);
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn insert_batch_filters_invalid_rows() {
        let (repo, _dir) = setup_test_repo().await;

        let batch = vec![observation(100.0), observation(0.0), observation(200.0)];
        assert!(repo.insert_batch(&batch).await);
        assert_eq!(repo.count().await.unwrap(), 2);

        // A batch with nothing valid reports failure
        assert!(!repo.insert_batch(&[observation(-1.0)]).await);
    }

    #[tokio::test]
    async fn empty_batch_is_a_no_op_success() {
        let (repo, _dir) = setup_test_repo().await;

        // Nothing to write means nothing failed
        assert!(repo.insert_batch(&[]).await);
        assert_eq!(repo.count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn latest_orders_newest_first() {
        let (repo, _dir) = setup_test_repo().await;

        for price in [1.0, 2.0, 3.0] {
            assert!(repo.insert(&observation(price)).await);
            // created_at has millisecond resolution
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let rows = repo.latest(2).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].price, 3.0);
        assert_eq!(rows[1].price, 2.0);
    }

    #[tokio::test]
    async fn same_timestamp_rows_order_newest_id_first() {
        let (repo, _dir) = setup_test_repo().await;

        // Back-to-back inserts can share a created_at millisecond; the row
        // id breaks the tie so the last write still sorts first.
        for price in [1.0, 2.0, 3.0, 4.0] {
            assert!(repo.insert(&observation(price)).await);
        }

        let rows = repo.latest(10).await.unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0].price, 4.0);
        assert_eq!(rows[1].price, 3.0);
        assert_eq!(rows[2].price, 2.0);
        assert_eq!(rows[3].price, 1.0);
        assert!(rows.windows(2).all(|pair| pair[0].id > pair[1].id));
    }

    #[tokio::test]
    async fn range_returns_rows_ascending() {
        let (repo, _dir) = setup_test_repo().await;

        assert!(repo.insert(&observation(10.0)).await);
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        assert!(repo.insert(&observation(20.0)).await);

        let start = Utc::now() - Duration::minutes(5);
        let end = Utc::now() + Duration::minutes(5);
        let rows = repo.range(start, end, 100).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].price, 10.0);
        assert_eq!(rows[1].price, 20.0);

        // A window in the past matches nothing
        let past = repo
            .range(start - Duration::days(2), start - Duration::days(1), 100)
            .await
            .unwrap();
        assert!(past.is_empty());
    }

    #[tokio::test]
    async fn delete_older_than_keeps_recent_rows() {
        let (repo, _dir) = setup_test_repo().await;

        assert!(repo.insert(&observation(42.0)).await);
        assert!(repo.delete_older_than(30).await);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_connection_reports_reachability() {
        let (repo, _dir) = setup_test_repo().await;
        assert!(repo.test_connection().await);
    }

    #[tokio::test]
    async fn multi_source_round_trip() {
        let (repo, _dir) = setup_test_repo().await;

        let mut prices = BTreeMap::new();
        prices.insert(
            "ny_price".to_string(),
            SourcePrice {
                price: 2050.10,
                currency: "USD".to_string(),
                source_url: "https://example.com/ny".to_string(),
            },
        );
        prices.insert(
            "ldn_price".to_string(),
            SourcePrice {
                price: 1612.40,
                currency: "GBP".to_string(),
                source_url: "https://example.com/ldn".to_string(),
            },
        );

        let observation = MultiSourceObservation {
            captured_at: Utc::now(),
            time_period: "realtime".to_string(),
            prices,
            primary_field: "ny_price".to_string(),
        };

        assert!(repo.insert_multi(&observation).await);

        let rows = repo.latest_multi(10).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].price, 2050.10);
        assert_eq!(rows[0].prices.len(), 2);
        assert_eq!(rows[0].prices["ldn_price"].currency, "GBP");
    }

    #[tokio::test]
    async fn range_multi_returns_windowed_rows_ascending() {
        let (repo, _dir) = setup_test_repo().await;

        for (field, value) in [("ny_price", 2050.10), ("ny_price", 2051.35)] {
            let mut prices = BTreeMap::new();
            prices.insert(
                field.to_string(),
                SourcePrice {
                    price: value,
                    currency: "USD".to_string(),
                    source_url: "https://example.com/ny".to_string(),
                },
            );
            let observation = MultiSourceObservation {
                captured_at: Utc::now(),
                time_period: "realtime".to_string(),
                prices,
                primary_field: field.to_string(),
            };
            assert!(repo.insert_multi(&observation).await);
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }

        let start = Utc::now() - Duration::minutes(5);
        let end = Utc::now() + Duration::minutes(5);
        let rows = repo.range_multi(start, end, 100).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].price, 2050.10);
        assert_eq!(rows[1].price, 2051.35);

        // A window in the past matches nothing
        let past = repo
            .range_multi(start - Duration::days(2), start - Duration::days(1), 100)
            .await
            .unwrap();
        assert!(past.is_empty());
    }

    #[tokio::test]
    async fn empty_multi_observation_is_rejected() {
        let (repo, _dir) = setup_test_repo().await;

        let observation = MultiSourceObservation {
            captured_at: Utc::now(),
            time_period: "realtime".to_string(),
            prices: BTreeMap::new(),
            primary_field: String::new(),
        };

        assert!(!repo.insert_multi(&observation).await);
        assert!(repo.latest_multi(10).await.unwrap().is_empty());
    }
}
