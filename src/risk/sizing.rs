//! Risk-neutral position sizing for binary contracts
//!
//! A long bought at `p` loses `p` per contract if the price goes to 0; a
//! short sold at `p` loses `1 - p` per contract if it goes to 1. Sizing each
//! side by its own worst case makes the maximum loss equal the stake for
//! both directions.

use crate::signal::Side;
use rust_decimal::Decimal;

/// Sizes positions so the worst-case loss equals a fixed stake
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskNeutralSizer {
    stake: Decimal,
}

impl RiskNeutralSizer {
    pub fn new(stake: Decimal) -> Self {
        Self { stake }
    }

    pub fn stake(&self) -> Decimal {
        self.stake
    }

    /// Contract count for a position entered at `entry_price`.
    ///
    /// `None` when the price leaves no room to lose (0 or 1) or is out of range.
    pub fn contracts(&self, side: Side, entry_price: Decimal) -> Option<Decimal> {
        let loss_per_contract = worst_case_loss_per_contract(side, entry_price)?;
        self.stake.checked_div(loss_per_contract)
    }
}

/// Loss per contract if the price moves all the way against the position
pub fn worst_case_loss_per_contract(side: Side, entry_price: Decimal) -> Option<Decimal> {
    if entry_price <= Decimal::ZERO || entry_price >= Decimal::ONE {
        return None;
    }
    Some(match side {
        Side::LongHome => entry_price,
        Side::ShortHome => Decimal::ONE - entry_price,
    })
}

/// Maximum theoretical loss of a sized position
pub fn max_loss(side: Side, entry_price: Decimal, contracts: Decimal) -> Decimal {
    worst_case_loss_per_contract(side, entry_price)
        .map(|per_contract| per_contract * contracts)
        .unwrap_or(Decimal::ZERO)
}
