//! Aligned snapshot types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Model probability and market price at one instant, in home-probability space
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedSnapshot {
    pub event_id: String,
    pub timestamp: DateTime<Utc>,
    pub model_probability: Decimal,
    pub market_price: Decimal,
    pub market_bid: Option<Decimal>,
    pub market_ask: Option<Decimal>,
}

impl AlignedSnapshot {
    /// Signed `model_probability - market_price`
    pub fn divergence(&self) -> Decimal {
        self.model_probability - self.market_price
    }
}

/// Something suspicious in an event's price series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AnomalyKind {
    /// Home price moved more than the configured step between snapshots
    PriceJump { from: Decimal, to: Decimal },
    /// Home and converted away prices disagree but sum to ~1: one side was
    /// never inverted
    SumToOne { home: Decimal, away_converted: Decimal },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignmentAnomaly {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: AnomalyKind,
}

/// Per-event alignment diagnostics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignmentReport {
    pub probability_points: usize,
    pub candles: usize,
    /// Probability points outside [0, 1]
    pub invalid_points: usize,
    /// Probability points sharing a timestamp with a later point
    pub duplicate_points: usize,
    /// Probability points with no candle inside the tolerance window
    pub unmatched_points: usize,
    /// Candles with a quote outside [0, 1]
    pub unconvertible_candles: usize,
    /// Candles with neither a resolved price nor a two-sided quote
    pub unpriced_candles: usize,
    /// Candles whose bid was above their ask (quotes discarded)
    pub crossed_quotes: usize,
    /// Candles superseded by another candle at the same timestamp
    pub superseded_candles: usize,
    /// Snapshots removed by the start/end exclusion windows
    pub trimmed_snapshots: usize,
    pub anomalies: Vec<AlignmentAnomaly>,
}

impl AlignmentReport {
    /// Count of sum-to-one anomalies
    pub fn sum_to_one_count(&self) -> usize {
        self.anomalies
            .iter()
            .filter(|a| matches!(a.kind, AnomalyKind::SumToOne { .. }))
            .count()
    }

    /// Count of price-jump anomalies
    pub fn price_jump_count(&self) -> usize {
        self.anomalies
            .iter()
            .filter(|a| matches!(a.kind, AnomalyKind::PriceJump { .. }))
            .count()
    }
}

/// Alignment output for one event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlignedEvent {
    pub event_id: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub snapshots: Vec<AlignedSnapshot>,
    pub report: AlignmentReport,
}

impl AlignedEvent {
    /// An event that cannot be traded at all
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }
}

/// Inputs the aligner refuses to merge
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AlignmentError {
    #[error("Event {expected}: received data for event {found}")]
    ForeignData { expected: String, found: String },
    #[error("Event {0}: end is not after start")]
    InvalidBounds(String),
}
