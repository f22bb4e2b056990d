//! Property tests for normalization, sizing, P&L and splits

use crate::support::*;
use divergence_backtest::align::{invert, to_home_space, SnapshotAligner};
use divergence_backtest::backtest::BacktestSimulator;
use divergence_backtest::data::MarketSide;
use divergence_backtest::execution::CostModel;
use divergence_backtest::optimizer::{EventSplit, Split};
use divergence_backtest::risk::{max_loss, RiskNeutralSizer};
use divergence_backtest::signal::{ParameterCombination, Side};
use proptest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashSet;

/// Prices in [0, 1] with cent-level resolution
fn price() -> impl Strategy<Value = Decimal> {
    (0u32..=100).prop_map(|cents| Decimal::new(cents as i64, 2))
}

/// Prices strictly inside (0, 1)
fn interior_price() -> impl Strategy<Value = Decimal> {
    (1u32..=99).prop_map(|cents| Decimal::new(cents as i64, 2))
}

fn side() -> impl Strategy<Value = Side> {
    prop_oneof![Just(Side::LongHome), Just(Side::ShortHome)]
}

proptest! {
    #[test]
    fn prop_double_inversion_is_identity(p in price()) {
        prop_assert_eq!(invert(invert(p)), p);
        let home = to_home_space(p, MarketSide::Away);
        prop_assert!(home >= Decimal::ZERO && home <= Decimal::ONE);
    }

    #[test]
    fn prop_max_loss_equals_stake(side in side(), p in interior_price(), stake in 1u32..10_000) {
        let stake = Decimal::from(stake);
        let contracts = RiskNeutralSizer::new(stake).contracts(side, p).unwrap();
        let loss = max_loss(side, p, contracts);
        prop_assert!((loss - stake).abs() < dec!(0.000001), "loss {} stake {}", loss, stake);
    }

    #[test]
    fn prop_aligned_prices_stay_in_home_space(
        rows in prop::collection::vec((price(), price(), any::<bool>()), 1..30)
    ) {
        let probabilities = rows
            .iter()
            .enumerate()
            .map(|(i, &(model, _, _))| point("evt", i as i64 * 10, model))
            .collect();
        let candles = rows
            .iter()
            .enumerate()
            .map(|(i, &(_, market, is_away))| {
                let mut candle = home_candle("evt", i as i64 * 10, market);
                candle.bid_price = None;
                candle.ask_price = None;
                if is_away {
                    candle.market_side = MarketSide::Away;
                    candle.resolved_price = Some(Decimal::ONE - market);
                }
                candle
            })
            .collect();

        let aligned = SnapshotAligner::default()
            .align_event(&event("evt", probabilities, candles))
            .unwrap();
        prop_assert_eq!(aligned.snapshots.len(), rows.len());
        for (snapshot, &(_, market, _)) in aligned.snapshots.iter().zip(&rows) {
            prop_assert_eq!(snapshot.market_price, market);
        }
        for pair in aligned.snapshots.windows(2) {
            prop_assert!(pair[1].timestamp > pair[0].timestamp);
        }
    }

    #[test]
    fn prop_net_identity_and_single_position(
        rows in prop::collection::vec((interior_price(), interior_price()), 2..60),
        entry in 2u32..=20,
        exit in 0u32..=5,
    ) {
        prop_assume!(exit < entry);
        let params = ParameterCombination::new(Decimal::new(entry as i64, 2), Decimal::new(exit as i64, 2)).unwrap();
        let probabilities = rows
            .iter()
            .enumerate()
            .map(|(i, &(model, _))| point("evt", i as i64 * 15, model))
            .collect();
        let candles = rows
            .iter()
            .enumerate()
            .map(|(i, &(_, market))| {
                let mut candle = home_candle("evt", i as i64 * 15, market);
                candle.bid_price = Some((market - dec!(0.01)).max(Decimal::ZERO));
                candle.ask_price = Some((market + dec!(0.01)).min(Decimal::ONE));
                candle
            })
            .collect();
        let aligned = SnapshotAligner::default()
            .align_event(&event("evt", probabilities, candles))
            .unwrap();

        let summary = BacktestSimulator::new(dec!(100), 30, CostModel::default())
            .run(&aligned.snapshots, params)
            .unwrap();

        let identity_gap = summary.net_profit - (summary.gross_profit - summary.fees - summary.slippage);
        prop_assert!(identity_gap.abs() < dec!(0.000000001), "gap {}", identity_gap);
        for trade in &summary.trades {
            prop_assert_eq!(trade.net_profit, trade.gross_profit - trade.fees - trade.slippage);
            prop_assert!(trade.exit_timestamp > trade.entry_timestamp);
        }
        for pair in summary.trades.windows(2) {
            prop_assert!(pair[1].entry_timestamp > pair[0].exit_timestamp);
        }
        if let Some(last) = summary.trades.last() {
            if last.forced_close {
                prop_assert_eq!(last.exit_timestamp, aligned.snapshots.last().unwrap().timestamp);
            }
        }
    }

    #[test]
    fn prop_split_is_deterministic_partition(n in 0usize..80, seed in any::<u64>()) {
        let ids: Vec<String> = (0..n).map(|i| format!("evt-{}", i)).collect();
        let split = EventSplit::compute(&ids, seed, 70, 15);
        prop_assert_eq!(&split, &EventSplit::compute(&ids, seed, 70, 15));

        let mut seen = HashSet::new();
        for s in Split::ALL {
            for id in split.ids(s) {
                prop_assert!(seen.insert(id.clone()));
            }
        }
        prop_assert_eq!(seen.len(), n);
        if n >= 3 {
            for s in Split::ALL {
                prop_assert!(!split.ids(s).is_empty());
            }
        }
    }
}
