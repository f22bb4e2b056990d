//! Snapshot alignment
//!
//! Merges one event's model probabilities with its market candles. Candles
//! are first normalized into home-probability space, collapsed to one quote
//! per timestamp, and then matched to probability points with a single
//! forward merge-scan over both sorted series.

use super::{AlignedEvent, AlignedSnapshot, AlignmentAnomaly, AlignmentError, AlignmentReport, AnomalyKind};
use crate::config::{self, AlignerConfig};
use crate::data::{EventData, MarketSide, RawMarketCandle, RawProbabilityPoint};
use crate::telemetry::{self, CounterMetric};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Converts a price quoted on `side` into home-probability space
pub fn to_home_space(price: Decimal, side: MarketSide) -> Decimal {
    match side {
        MarketSide::Home => price,
        MarketSide::Away => invert(price),
    }
}

/// `1 - p`
pub fn invert(price: Decimal) -> Decimal {
    Decimal::ONE - price
}

fn in_unit_interval(price: Decimal) -> bool {
    price >= Decimal::ZERO && price <= Decimal::ONE
}

fn mid(bid: Option<Decimal>, ask: Option<Decimal>) -> Option<Decimal> {
    Some((bid? + ask?) / Decimal::TWO)
}

/// A candle after normalization into home space
#[derive(Debug, Clone, PartialEq)]
struct HomeQuote {
    timestamp: DateTime<Utc>,
    side: MarketSide,
    price: Decimal,
    bid: Option<Decimal>,
    ask: Option<Decimal>,
    crossed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CandleRejection {
    Unconvertible,
    Unpriced,
}

/// Normalize one candle. Inverting an away book swaps its sides: the away
/// ask becomes the home bid and vice versa.
fn normalize_candle(candle: &RawMarketCandle) -> Result<HomeQuote, CandleRejection> {
    let quotes = [candle.resolved_price, candle.bid_price, candle.ask_price];
    if quotes.iter().flatten().any(|p| !in_unit_interval(*p)) {
        return Err(CandleRejection::Unconvertible);
    }

    let crossed = matches!(
        (candle.bid_price, candle.ask_price),
        (Some(bid), Some(ask)) if bid > ask
    );
    let (bid, ask) = if crossed {
        (None, None)
    } else {
        (candle.bid_price, candle.ask_price)
    };

    let (resolved, bid, ask) = match candle.market_side {
        MarketSide::Home => (candle.resolved_price, bid, ask),
        MarketSide::Away => (
            candle.resolved_price.map(invert),
            ask.map(invert),
            bid.map(invert),
        ),
    };

    let price = resolved
        .or_else(|| mid(bid, ask))
        .ok_or(CandleRejection::Unpriced)?;

    Ok(HomeQuote {
        timestamp: candle.timestamp,
        side: candle.market_side,
        price,
        bid,
        ask,
        crossed,
    })
}

/// Merges probability and market series into aligned snapshots
#[derive(Debug, Clone, Default)]
pub struct SnapshotAligner {
    config: AlignerConfig,
}

impl SnapshotAligner {
    pub fn new(config: AlignerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AlignerConfig {
        &self.config
    }

    /// Align a loaded event
    pub fn align_event(&self, event: &EventData) -> Result<AlignedEvent, AlignmentError> {
        self.align(
            &event.event_id,
            event.start,
            event.end,
            &event.probabilities,
            &event.candles,
        )
    }

    /// Align raw series for one event bounded by `start..=end`
    pub fn align(
        &self,
        event_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        probabilities: &[RawProbabilityPoint],
        candles: &[RawMarketCandle],
    ) -> Result<AlignedEvent, AlignmentError> {
        if end <= start {
            return Err(AlignmentError::InvalidBounds(event_id.to_string()));
        }
        let foreign = probabilities
            .iter()
            .map(|p| p.event_id.as_str())
            .chain(candles.iter().map(|c| c.event_id.as_str()))
            .find(|id| !id.is_empty() && *id != event_id);
        if let Some(found) = foreign {
            return Err(AlignmentError::ForeignData {
                expected: event_id.to_string(),
                found: found.to_string(),
            });
        }

        let mut report = AlignmentReport {
            probability_points: probabilities.len(),
            candles: candles.len(),
            ..Default::default()
        };

        let quotes = self.normalize_candles(event_id, candles, &mut report);
        let points = prepare_points(probabilities, &mut report);
        let mut snapshots = self.merge_scan(event_id, &points, &quotes, &mut report);
        self.trim(&mut snapshots, start, end, &mut report);
        self.flag_price_jumps(event_id, &snapshots, &mut report);

        telemetry::increment(CounterMetric::SnapshotsAligned, snapshots.len() as u64);
        telemetry::increment(
            CounterMetric::AlignmentAnomalies,
            report.anomalies.len() as u64,
        );

        if snapshots.is_empty() {
            tracing::warn!(
                event_id,
                points = report.probability_points,
                candles = report.candles,
                unmatched = report.unmatched_points,
                "No aligned snapshots for event"
            );
        } else {
            tracing::debug!(
                event_id,
                snapshots = snapshots.len(),
                unmatched = report.unmatched_points,
                unpriced = report.unpriced_candles,
                trimmed = report.trimmed_snapshots,
                anomalies = report.anomalies.len(),
                "Aligned event"
            );
        }

        Ok(AlignedEvent {
            event_id: event_id.to_string(),
            start,
            end,
            snapshots,
            report,
        })
    }

    /// Normalize candles and collapse them to one quote per timestamp,
    /// preferring the home-side candle
    fn normalize_candles(
        &self,
        event_id: &str,
        candles: &[RawMarketCandle],
        report: &mut AlignmentReport,
    ) -> Vec<HomeQuote> {
        let mut quotes = Vec::with_capacity(candles.len());
        for candle in candles {
            match normalize_candle(candle) {
                Ok(quote) => {
                    if quote.crossed {
                        report.crossed_quotes += 1;
                    }
                    quotes.push(quote);
                }
                Err(CandleRejection::Unconvertible) => {
                    report.unconvertible_candles += 1;
                    tracing::warn!(
                        event_id,
                        timestamp = %candle.timestamp,
                        side = ?candle.market_side,
                        "Dropping candle with quote outside [0, 1]"
                    );
                }
                Err(CandleRejection::Unpriced) => report.unpriced_candles += 1,
            }
        }

        // Stable: same-side candles at one timestamp keep their input order
        quotes.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.side.cmp(&b.side)));

        let mut merged: Vec<HomeQuote> = Vec::with_capacity(quotes.len());
        let mut i = 0;
        while i < quotes.len() {
            let timestamp = quotes[i].timestamp;
            let group_end = quotes[i..]
                .iter()
                .position(|q| q.timestamp != timestamp)
                .map_or(quotes.len(), |offset| i + offset);
            let group = &quotes[i..group_end];

            let home = group.iter().rev().find(|q| q.side == MarketSide::Home);
            let away = group.iter().rev().find(|q| q.side == MarketSide::Away);
            if let (Some(home), Some(away)) = (home, away) {
                self.check_sum_to_one(event_id, home, away, report);
            }
            if let Some(chosen) = home.or(away) {
                merged.push(chosen.clone());
            }
            report.superseded_candles += group.len() - 1;
            i = group_end;
        }

        merged
    }

    /// Both sides are in home space here, so they should agree. Two prices
    /// that disagree yet sum to one mean the away side was never inverted.
    fn check_sum_to_one(
        &self,
        event_id: &str,
        home: &HomeQuote,
        away: &HomeQuote,
        report: &mut AlignmentReport,
    ) {
        let disagreement = (home.price - away.price).abs();
        let sum_gap = (home.price + away.price - Decimal::ONE).abs();
        if disagreement > self.config.side_disagreement_tolerance
            && sum_gap <= self.config.sum_to_one_tolerance
        {
            tracing::warn!(
                event_id,
                timestamp = %home.timestamp,
                home = %home.price,
                away_converted = %away.price,
                "Home and away prices sum to one after conversion; dropping away candle"
            );
            report.anomalies.push(AlignmentAnomaly {
                timestamp: home.timestamp,
                kind: AnomalyKind::SumToOne {
                    home: home.price,
                    away_converted: away.price,
                },
            });
        }
    }

    /// Forward merge-scan: for each point, the nearest quote is either the
    /// last quote at or before it or the first quote after it
    fn merge_scan(
        &self,
        event_id: &str,
        points: &[(DateTime<Utc>, Decimal)],
        quotes: &[HomeQuote],
        report: &mut AlignmentReport,
    ) -> Vec<AlignedSnapshot> {
        let tolerance = config::window(self.config.tolerance_seconds);
        let mut snapshots = Vec::with_capacity(points.len());
        let mut upper = 0;

        for &(timestamp, probability) in points {
            while upper < quotes.len() && quotes[upper].timestamp <= timestamp {
                upper += 1;
            }
            let before = upper.checked_sub(1).map(|idx| &quotes[idx]);
            let after = quotes.get(upper);

            let nearest = match (before, after) {
                (Some(b), Some(a)) => {
                    if timestamp - b.timestamp <= a.timestamp - timestamp {
                        Some(b)
                    } else {
                        Some(a)
                    }
                }
                (b, a) => b.or(a),
            };

            let matched = nearest.filter(|q| {
                let distance = if q.timestamp >= timestamp {
                    q.timestamp - timestamp
                } else {
                    timestamp - q.timestamp
                };
                distance <= tolerance
            });

            match matched {
                Some(quote) => snapshots.push(AlignedSnapshot {
                    event_id: event_id.to_string(),
                    timestamp,
                    model_probability: probability,
                    market_price: quote.price,
                    market_bid: quote.bid,
                    market_ask: quote.ask,
                }),
                None => report.unmatched_points += 1,
            }
        }

        snapshots
    }

    fn trim(
        &self,
        snapshots: &mut Vec<AlignedSnapshot>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        report: &mut AlignmentReport,
    ) {
        let first = config::window(self.config.exclude_first_seconds);
        let last = config::window(self.config.exclude_last_seconds);
        if first.is_zero() && last.is_zero() {
            return;
        }

        // A window past the representable range trims everything
        let keep_from = start.checked_add_signed(first);
        let keep_until = end.checked_sub_signed(last);
        let before = snapshots.len();
        snapshots.retain(|s| match (keep_from, keep_until) {
            (Some(from), Some(until)) => s.timestamp >= from && s.timestamp <= until,
            _ => false,
        });
        report.trimmed_snapshots = before - snapshots.len();
    }

    fn flag_price_jumps(
        &self,
        event_id: &str,
        snapshots: &[AlignedSnapshot],
        report: &mut AlignmentReport,
    ) {
        for pair in snapshots.windows(2) {
            let (prev, next) = (&pair[0], &pair[1]);
            if (next.market_price - prev.market_price).abs() > self.config.max_price_step {
                tracing::warn!(
                    event_id,
                    timestamp = %next.timestamp,
                    from = %prev.market_price,
                    to = %next.market_price,
                    "Home price jumped beyond the sane step"
                );
                report.anomalies.push(AlignmentAnomaly {
                    timestamp: next.timestamp,
                    kind: AnomalyKind::PriceJump {
                        from: prev.market_price,
                        to: next.market_price,
                    },
                });
            }
        }
    }
}

/// Sort probability points, drop invalid ones, and keep the last point per timestamp
fn prepare_points(
    probabilities: &[RawProbabilityPoint],
    report: &mut AlignmentReport,
) -> Vec<(DateTime<Utc>, Decimal)> {
    let mut valid: Vec<&RawProbabilityPoint> = probabilities
        .iter()
        .filter(|p| in_unit_interval(p.home_win_probability))
        .collect();
    report.invalid_points = probabilities.len() - valid.len();
    valid.sort_by_key(|p| p.timestamp);

    let mut points: Vec<(DateTime<Utc>, Decimal)> = Vec::with_capacity(valid.len());
    for point in valid {
        match points.last_mut() {
            Some(last) if last.0 == point.timestamp => {
                last.1 = point.home_win_probability;
                report.duplicate_points += 1;
            }
            _ => points.push((point.timestamp, point.home_win_probability)),
        }
    }
    points
}
