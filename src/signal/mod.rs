//! Signal generation module
//!
//! Divergence entry rule, exit hysteresis, and strategy parameters

mod detector;
mod types;

pub use detector::{DivergenceDetector, ExitHysteresis};
pub use types::{ParameterCombination, Side, SignalError};
