//! Diesel ORM models for database tables.

use diesel::prelude::*;

use crate::schema;

/// Single-source price row from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::price_records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PriceRecord {
    pub id: i32,
    pub price: f64,
    pub created_at: String,
    pub source: String,
    pub currency: String,
    pub time_period: String,
}

/// New single-source price for insertion.
///
/// `id` and `created_at` are intentionally absent: both are assigned by
/// the store.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::price_records)]
pub struct NewPriceRecord<'a> {
    pub price: f64,
    pub source: &'a str,
    pub currency: &'a str,
    pub time_period: &'a str,
}

/// Multi-source price row from the database.
#[derive(Queryable, Selectable, Identifiable, Debug, Clone)]
#[diesel(table_name = schema::multi_price_records)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct MultiPriceRecord {
    pub id: i32,
    pub price: f64,
    pub created_at: String,
    pub time_period: String,
    pub prices: String,
}

/// New multi-source row for insertion.
#[derive(Insertable, Debug)]
#[diesel(table_name = schema::multi_price_records)]
pub struct NewMultiPriceRecord<'a> {
    pub price: f64,
    pub time_period: &'a str,
    pub prices: &'a str,
}
