//! Data module
//!
//! Input contract from the external store, dataset loading, and the
//! Parquet trade ledger export

mod parquet;
mod source;
mod types;

pub use self::parquet::{trade_ledger_schema, TradeLedgerReader, TradeLedgerWriter};
pub use source::{validate_dataset, EventSource, JsonEventSource};
pub use types::{
    DataError, Dataset, EventData, EventOutcome, MarketSide, RawMarketCandle, RawProbabilityPoint,
};
