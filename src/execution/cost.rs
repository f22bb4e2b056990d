//! Execution cost model
//!
//! Fees follow the binary-option market maker spread shape
//! `fee_rate * p * (1 - p) * stake`, largest at p = 0.5. Slippage is charged
//! only when an exit cannot use a real quote, or when the position is
//! liquidated at event end.

use crate::config::CostConfig;
use crate::signal::Side;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One price unit (a cent) in probability space
pub const PRICE_UNIT: Decimal = dec!(0.01);

/// How an exit price was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionQuality {
    /// Executed against the bid/ask on the closing side
    Quoted,
    /// No closing-side quote; the aligned market price was used
    Fallback,
}

impl ExecutionQuality {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionQuality::Quoted => "quoted",
            ExecutionQuality::Fallback => "fallback",
        }
    }
}

impl FromStr for ExecutionQuality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quoted" => Ok(ExecutionQuality::Quoted),
            "fallback" => Ok(ExecutionQuality::Fallback),
            other => Err(format!("unknown execution quality: {}", other)),
        }
    }
}

/// Costs charged when a position is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitCosts {
    pub fee: Decimal,
    pub slippage: Decimal,
}

/// Pure fee and slippage calculator
#[derive(Debug, Clone, PartialEq)]
pub struct CostModel {
    fee_rate: Decimal,
    fallback_penalty: Decimal,
    forced_penalty: Decimal,
}

impl CostModel {
    /// Create a cost model; penalties are given in price units
    pub fn new(fee_rate: Decimal, fallback_units: Decimal, forced_units: Decimal) -> Self {
        Self {
            fee_rate,
            fallback_penalty: fallback_units * PRICE_UNIT,
            forced_penalty: forced_units * PRICE_UNIT,
        }
    }

    /// Create from CostConfig
    pub fn from_config(config: &CostConfig) -> Self {
        Self::new(
            config.fee_rate,
            config.fallback_slippage_units,
            config.forced_liquidation_units,
        )
    }

    /// Fee for one execution at `price`
    pub fn fee(&self, price: Decimal, stake: Decimal) -> Decimal {
        self.fee_rate * price * (Decimal::ONE - price) * stake
    }

    /// Adverse price move applied to an exit, in probability space.
    ///
    /// Capped so the effective exit price never leaves [0, 1].
    pub fn slippage_penalty(
        &self,
        side: Side,
        exit_price: Decimal,
        quality: ExecutionQuality,
        forced: bool,
    ) -> Decimal {
        let mut penalty = Decimal::ZERO;
        if quality == ExecutionQuality::Fallback {
            penalty += self.fallback_penalty;
        }
        if forced {
            penalty += self.forced_penalty;
        }

        let headroom = match side {
            Side::LongHome => exit_price,
            Side::ShortHome => Decimal::ONE - exit_price,
        };
        penalty.min(headroom).max(Decimal::ZERO)
    }

    /// Fee and slippage for closing `contracts` at `exit_price`
    pub fn exit_costs(
        &self,
        side: Side,
        exit_price: Decimal,
        contracts: Decimal,
        stake: Decimal,
        quality: ExecutionQuality,
        forced: bool,
    ) -> ExitCosts {
        ExitCosts {
            fee: self.fee(exit_price, stake),
            slippage: self.slippage_penalty(side, exit_price, quality, forced) * contracts,
        }
    }
}

impl Default for CostModel {
    fn default() -> Self {
        Self::from_config(&CostConfig::default())
    }
}
