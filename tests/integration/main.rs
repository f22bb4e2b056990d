//! Integration tests

mod optimizer;
mod progress;
mod properties;
mod scenarios;

pub mod support {
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use divergence_backtest::data::{EventData, MarketSide, RawMarketCandle, RawProbabilityPoint};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    pub fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 19, 0, 0).unwrap() + Duration::seconds(secs)
    }

    pub fn point(event_id: &str, secs: i64, probability: Decimal) -> RawProbabilityPoint {
        RawProbabilityPoint {
            event_id: event_id.to_string(),
            timestamp: t(secs),
            home_win_probability: probability,
        }
    }

    /// Home-side candle quoted one cent either side of `price`
    pub fn home_candle(event_id: &str, secs: i64, price: Decimal) -> RawMarketCandle {
        RawMarketCandle {
            event_id: event_id.to_string(),
            market_side: MarketSide::Home,
            timestamp: t(secs),
            resolved_price: Some(price),
            bid_price: Some(price - dec!(0.01)),
            ask_price: Some(price + dec!(0.01)),
        }
    }

    /// The same quote as [`home_candle`], expressed on the away market
    pub fn away_candle(event_id: &str, secs: i64, home_price: Decimal) -> RawMarketCandle {
        let away = Decimal::ONE - home_price;
        RawMarketCandle {
            event_id: event_id.to_string(),
            market_side: MarketSide::Away,
            timestamp: t(secs),
            resolved_price: Some(away),
            bid_price: Some(away - dec!(0.01)),
            ask_price: Some(away + dec!(0.01)),
        }
    }

    pub fn event(
        event_id: &str,
        probabilities: Vec<RawProbabilityPoint>,
        candles: Vec<RawMarketCandle>,
    ) -> EventData {
        EventData {
            event_id: event_id.to_string(),
            start: t(0),
            end: t(3600),
            probabilities,
            candles,
            outcome: None,
        }
    }

    /// Event built from `(secs, model, market)` rows with home candles
    pub fn event_from_rows(event_id: &str, rows: &[(i64, Decimal, Decimal)]) -> EventData {
        event(
            event_id,
            rows.iter().map(|&(s, m, _)| point(event_id, s, m)).collect(),
            rows.iter().map(|&(s, _, p)| home_candle(event_id, s, p)).collect(),
        )
    }

    /// A profitable convergence when `edge` clears the entry threshold
    pub fn converging_event(event_id: &str, edge: Decimal) -> EventData {
        let model = dec!(0.50) + edge;
        event_from_rows(
            event_id,
            &[
                (0, model, dec!(0.50)),
                (30, model, dec!(0.50)),
                (60, model, model - dec!(0.03)),
                (120, model, model),
                (180, model, model),
            ],
        )
    }
}
