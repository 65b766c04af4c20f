//! Data models for PriceWatch.

mod observation;
mod record;

pub use observation::{MultiSourceObservation, PriceObservation, SourcePrice};
pub use record::{MultiStoredRecord, StoredRecord};
