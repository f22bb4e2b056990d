//! Parameter grid
//!
//! The grid is the cross product of entry and exit candidates, ordered by
//! entry then exit ascending. Pairs with `exit >= entry` are skipped.

use super::GridError;
use crate::config::{GridConfig, RangeSpec};
use crate::signal::ParameterCombination;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

pub const ENTRY_MIN: Decimal = dec!(0.02);
pub const ENTRY_MAX: Decimal = dec!(0.20);
pub const EXIT_MIN: Decimal = dec!(0.00);
pub const EXIT_MAX: Decimal = dec!(0.05);

/// Ordered parameter combinations to sweep
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterGrid {
    combinations: Vec<ParameterCombination>,
}

impl ParameterGrid {
    /// Build from explicit candidate lists
    pub fn new(entries: &[Decimal], exits: &[Decimal]) -> Result<Self, GridError> {
        let entries = prepare("entry", entries, ENTRY_MIN, ENTRY_MAX)?;
        let exits = prepare("exit", exits, EXIT_MIN, EXIT_MAX)?;

        let mut combinations = Vec::with_capacity(entries.len() * exits.len());
        for &entry in &entries {
            for &exit in exits.iter().take_while(|&&exit| exit < entry) {
                combinations.push(ParameterCombination::new(entry, exit)?);
            }
        }

        if combinations.is_empty() {
            return Err(GridError::NoValidCombinations);
        }
        Ok(Self { combinations })
    }

    /// Build from `(start, stop, step)` ranges
    pub fn from_ranges(entry: &RangeSpec, exit: &RangeSpec) -> Result<Self, GridError> {
        Self::new(&expand_range("entry", entry)?, &expand_range("exit", exit)?)
    }

    /// Explicit lists take precedence over ranges
    pub fn from_config(config: &GridConfig) -> Result<Self, GridError> {
        let entries = match &config.entry_thresholds {
            Some(list) => list.clone(),
            None => expand_range("entry", &config.entry_range)?,
        };
        let exits = match &config.exit_thresholds {
            Some(list) => list.clone(),
            None => expand_range("exit", &config.exit_range)?,
        };
        Self::new(&entries, &exits)
    }

    /// A grid of exactly one combination
    pub fn single(combination: ParameterCombination) -> Self {
        Self {
            combinations: vec![combination],
        }
    }

    pub fn combinations(&self) -> &[ParameterCombination] {
        &self.combinations
    }

    pub fn len(&self) -> usize {
        self.combinations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.combinations.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ParameterCombination> {
        self.combinations.iter()
    }
}

/// Check the surface, sort ascending and drop duplicates
fn prepare(
    field: &'static str,
    candidates: &[Decimal],
    min: Decimal,
    max: Decimal,
) -> Result<Vec<Decimal>, GridError> {
    if candidates.is_empty() {
        return Err(GridError::NoCandidates(field));
    }
    if let Some(&value) = candidates.iter().find(|&&v| v < min || v > max) {
        return Err(GridError::OutOfSurface {
            field,
            value,
            min,
            max,
        });
    }

    let mut sorted: Vec<Decimal> = candidates.iter().map(|v| v.normalize()).collect();
    sorted.sort();
    sorted.dedup();
    Ok(sorted)
}

/// Inclusive `start..=stop` in `step` increments
pub fn expand_range(field: &'static str, range: &RangeSpec) -> Result<Vec<Decimal>, GridError> {
    if range.step <= Decimal::ZERO {
        return Err(GridError::InvalidStep {
            field,
            step: range.step,
        });
    }

    let mut values = Vec::new();
    let mut value = range.start;
    while value <= range.stop {
        values.push(value);
        value += range.step;
    }
    Ok(values)
}
