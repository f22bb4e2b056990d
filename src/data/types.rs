//! Raw input types delivered by the external store

use crate::model::ModelManifest;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Which side of the event a market quotes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketSide {
    Home,
    Away,
}

/// Real-world result of an event.
///
/// Carried for reporting only. Nothing on the P&L path reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventOutcome {
    Home,
    Away,
}

/// One output of the probability model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawProbabilityPoint {
    /// Owning event (filled in by the loader when omitted)
    #[serde(default)]
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    /// Probability that the home side wins, in [0, 1]
    pub home_win_probability: Decimal,
}

/// One market candle as stored, quoted on either side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMarketCandle {
    #[serde(default)]
    pub event_id: String,
    pub market_side: MarketSide,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub resolved_price: Option<Decimal>,
    #[serde(default)]
    pub bid_price: Option<Decimal>,
    #[serde(default)]
    pub ask_price: Option<Decimal>,
}

/// Everything the core needs about one event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventData {
    pub event_id: String,
    /// Scheduled or observed start of the event
    pub start: DateTime<Utc>,
    /// End of the event (last tradable moment)
    pub end: DateTime<Utc>,
    #[serde(default)]
    pub probabilities: Vec<RawProbabilityPoint>,
    #[serde(default)]
    pub candles: Vec<RawMarketCandle>,
    #[serde(default)]
    pub outcome: Option<EventOutcome>,
}

/// A loaded universe of events plus the model that produced the probabilities
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub model: Option<ModelManifest>,
    pub events: Vec<EventData>,
}

impl Dataset {
    /// Event identifiers in load order
    pub fn event_ids(&self) -> Vec<String> {
        self.events.iter().map(|e| e.event_id.clone()).collect()
    }
}

/// Data loading and export errors
#[derive(Debug, Error)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid dataset JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Event {event_id}: contains a point belonging to event {found}")]
    ForeignPoint { event_id: String, found: String },
    #[error("Event {0}: end is not after start")]
    InvalidBounds(String),
    #[error("Duplicate event id: {0}")]
    DuplicateEvent(String),
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),
    #[error("Invalid ledger column: {0}")]
    InvalidColumn(String),
}
