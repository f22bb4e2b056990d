//! Divergence entry and exit rules
//!
//! Divergence is `model_probability - market_price`. Entries fire on a wide
//! divergence that is not already converging; exits fire when the
//! divergence crosses back inside the exit band.

use super::{ParameterCombination, Side};
use rust_decimal::Decimal;

/// Applies the entry rule of one parameter combination
#[derive(Debug, Clone)]
pub struct DivergenceDetector {
    params: ParameterCombination,
}

impl DivergenceDetector {
    pub fn new(params: ParameterCombination) -> Self {
        Self { params }
    }

    pub fn params(&self) -> ParameterCombination {
        self.params
    }

    /// Side to enter, if any.
    ///
    /// Requires a prior divergence: the first snapshot of an event cannot
    /// show whether the signal is widening.
    pub fn entry_side(&self, previous: Option<Decimal>, current: Decimal) -> Option<Side> {
        let previous = previous?;
        let threshold = self.params.entry_threshold();

        let side = if current > threshold {
            Side::LongHome
        } else if current < -threshold {
            Side::ShortHome
        } else {
            return None;
        };

        if is_widening(previous, current) {
            Some(side)
        } else {
            tracing::trace!(%previous, %current, "Divergence converging, entry suppressed");
            None
        }
    }

    /// Fresh exit latch for a position opened at `entry_divergence`
    pub fn exit_latch(&self, entry_divergence: Decimal) -> ExitHysteresis {
        ExitHysteresis::new(self.params.exit_threshold(), entry_divergence)
    }
}

/// Same sign as before and no smaller in magnitude
fn is_widening(previous: Decimal, current: Decimal) -> bool {
    let same_sign = (previous > Decimal::ZERO && current > Decimal::ZERO)
        || (previous < Decimal::ZERO && current < Decimal::ZERO);
    same_sign && current.abs() >= previous.abs()
}

/// Exit hysteresis latch.
///
/// Armed when `|divergence|` crosses from at-or-above the exit threshold to
/// below it, disarmed when it leaves the band again. Hovering inside the
/// band never re-arms by itself, so a boundary-hugging divergence cannot
/// churn the position.
#[derive(Debug, Clone)]
pub struct ExitHysteresis {
    threshold: Decimal,
    outside: bool,
    armed: bool,
}

impl ExitHysteresis {
    pub fn new(threshold: Decimal, entry_divergence: Decimal) -> Self {
        Self {
            threshold,
            outside: entry_divergence.abs() >= threshold,
            armed: false,
        }
    }

    /// Feed the next divergence; returns whether the latch is armed
    pub fn observe(&mut self, divergence: Decimal) -> bool {
        let outside = divergence.abs() >= self.threshold;
        if outside {
            self.armed = false;
        } else if self.outside {
            self.armed = true;
        }
        self.outside = outside;
        self.armed
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }
}
