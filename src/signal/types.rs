//! Signal types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Direction of an open position, in home-probability space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    /// Bought home: profits when the home price rises
    LongHome,
    /// Sold home: profits when the home price falls
    ShortHome,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::LongHome => "long_home",
            Side::ShortHome => "short_home",
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "long_home" => Ok(Side::LongHome),
            "short_home" => Ok(Side::ShortHome),
            other => Err(format!("unknown side: {}", other)),
        }
    }
}

/// Invalid strategy parameters
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    #[error("exit threshold {exit} must be below entry threshold {entry}")]
    ExitNotBelowEntry { entry: Decimal, exit: Decimal },
    #[error("threshold {0} must not be negative")]
    NegativeThreshold(Decimal),
}

/// One point of the parameter grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawCombination")]
pub struct ParameterCombination {
    entry_threshold: Decimal,
    exit_threshold: Decimal,
}

#[derive(Deserialize)]
struct RawCombination {
    entry_threshold: Decimal,
    exit_threshold: Decimal,
}

impl TryFrom<RawCombination> for ParameterCombination {
    type Error = SignalError;

    fn try_from(raw: RawCombination) -> Result<Self, Self::Error> {
        Self::new(raw.entry_threshold, raw.exit_threshold)
    }
}

impl ParameterCombination {
    /// Create a combination, enforcing `0 <= exit < entry`
    pub fn new(entry_threshold: Decimal, exit_threshold: Decimal) -> Result<Self, SignalError> {
        if exit_threshold < Decimal::ZERO {
            return Err(SignalError::NegativeThreshold(exit_threshold));
        }
        if exit_threshold >= entry_threshold {
            return Err(SignalError::ExitNotBelowEntry {
                entry: entry_threshold,
                exit: exit_threshold,
            });
        }
        Ok(Self {
            entry_threshold,
            exit_threshold,
        })
    }

    pub fn entry_threshold(&self) -> Decimal {
        self.entry_threshold
    }

    pub fn exit_threshold(&self) -> Decimal {
        self.exit_threshold
    }

    /// Human-readable label used in progress messages and file names
    pub fn label(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ParameterCombination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "entry={} exit={}",
            self.entry_threshold.normalize(),
            self.exit_threshold.normalize()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_combination_requires_exit_below_entry() {
        assert!(ParameterCombination::new(dec!(0.05), dec!(0.02)).is_ok());
        assert_eq!(
            ParameterCombination::new(dec!(0.05), dec!(0.05)),
            Err(SignalError::ExitNotBelowEntry {
                entry: dec!(0.05),
                exit: dec!(0.05)
            })
        );
        assert!(ParameterCombination::new(dec!(0.02), dec!(0.04)).is_err());
    }

    #[test]
    fn test_combination_rejects_negative_exit() {
        assert_eq!(
            ParameterCombination::new(dec!(0.05), dec!(-0.01)),
            Err(SignalError::NegativeThreshold(dec!(-0.01)))
        );
    }

    #[test]
    fn test_combination_label() {
        let combo = ParameterCombination::new(dec!(0.050), dec!(0.00)).unwrap();
        assert_eq!(combo.label(), "entry=0.05 exit=0");
    }

    #[test]
    fn test_combination_deserialize_validates() {
        let ok: ParameterCombination =
            serde_json::from_str(r#"{"entry_threshold":"0.1","exit_threshold":"0.02"}"#).unwrap();
        assert_eq!(ok.entry_threshold(), dec!(0.1));

        let bad = serde_json::from_str::<ParameterCombination>(
            r#"{"entry_threshold":"0.02","exit_threshold":"0.1"}"#,
        );
        assert!(bad.is_err());
    }

    #[test]
    fn test_side_round_trip() {
        for side in [Side::LongHome, Side::ShortHome] {
            assert_eq!(Side::from_str(side.as_str()), Ok(side));
        }
        assert!(Side::from_str("yes").is_err());
    }
}
